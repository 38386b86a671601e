//! Configuration infrastructure
//!
//! Contains configuration loading and management for the truck data pipeline.
//!
//! Configuration is organized into:
//! 1. Runtime settings (logging, database, browser, storage)
//! 2. Source catalogues (FAQ sites, vehicle models, market and statistics URLs)
//! 3. Classifier keyword tables (ordered, first match wins)

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::derivable_impls)]

use crate::domain::faq::{FaqCategory, FuelTag};
use crate::infrastructure::parsing::config::{
    FaqStrategy, InteractionMode, MarketSelectors, PageTotalSource, VehicleSelectors,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub browser: BrowserConfig,
    pub storage: StorageConfig,
    pub faq: FaqConfig,
    pub classifier: ClassifierConfig,
    pub vehicles: VehicleConfig,
    pub market: MarketSelectors,
    pub sources: SourceUrls,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Log file name inside the log directory
    pub file_name: String,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Enable automatic log cleanup on startup
    pub auto_cleanup_logs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. `sqlite:data/truck.db`
    pub url: String,
}

/// Headless browser settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Explicit Chrome/Chromium binary. Discovered on PATH when unset.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub window_size: (u32, u32),
    /// Upper bound for a single navigation
    pub navigation_timeout_secs: u64,
    /// Upper bound for an explicit element wait
    pub element_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub image_dir: PathBuf,
    pub download_images: bool,
}

/// One FAQ source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqSiteConfig {
    pub name: String,
    pub url: String,
    pub description: String,
    pub default_category: FaqCategory,
    pub default_fuel: FuelTag,
    /// Settle time after the initial page load
    pub wait_secs: u64,
    pub strategy: FaqStrategy,
    #[serde(default)]
    pub interaction: InteractionMode,
    #[serde(default)]
    pub scroll_to_bottom: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaqConfig {
    pub sites: Vec<FaqSiteConfig>,
    pub min_question_chars: usize,
    pub min_answer_chars: usize,
    /// Answer value kept even though it is shorter than `min_answer_chars`
    pub unavailable_sentinel: String,
}

/// Label with its keyword set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordGroup {
    pub label: String,
    pub keywords: Vec<String>,
}

impl KeywordGroup {
    pub fn new(label: &str, keywords: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
        }
    }
}

/// Ordered keyword tables. Declaration order is the tie-break.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub categories: Vec<KeywordGroup>,
    pub fuel_types: Vec<KeywordGroup>,
}

/// One danawa model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleModelConfig {
    pub key: String,
    pub model_id: String,
    pub name: String,
    pub maker: String,
    pub search_keyword: String,
    /// Restrict crawling to these lineups; all lineups when empty
    #[serde(default)]
    pub lineup_ids: Vec<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub models: Vec<VehicleModelConfig>,
    pub selectors: VehicleSelectors,
}

/// External page locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceUrls {
    pub opinet_diesel: String,
    pub opinet_lpg: String,
    pub ev_charge_price: String,
    pub charger_stats: String,
    pub molit_stats: String,
    /// `{model}`, `{lineup}`, `{tab}` placeholders
    pub danawa_model: String,
    /// `{query}` placeholder
    pub danawa_search: String,
    /// Download listing stops at the first entry containing this text
    pub registration_stop_marker: String,
    /// Only entries containing this text are downloaded
    pub registration_keyword: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            file_name: defaults::LOG_FILE_NAME.to_string(),
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: defaults::LOG_AUTO_CLEANUP,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::DATABASE_URL.to_string(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            window_size: (1920, 1080),
            navigation_timeout_secs: defaults::NAVIGATION_TIMEOUT_SECS,
            element_timeout_secs: defaults::ELEMENT_TIMEOUT_SECS,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
            image_dir: PathBuf::from("data/images"),
            download_images: false,
        }
    }
}

impl Default for FaqConfig {
    fn default() -> Self {
        Self {
            sites: default_faq_sites(),
            min_question_chars: defaults::MIN_QUESTION_CHARS,
            min_answer_chars: defaults::MIN_ANSWER_CHARS,
            unavailable_sentinel: defaults::UNAVAILABLE_SENTINEL.to_string(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            categories: vec![
                KeywordGroup::new("cost", &["비용", "보조금", "지원금", "가격", "할인", "환급", "세금", "부가세", "요금"]),
                KeywordGroup::new(
                    "registration",
                    &["등록", "허가", "번호판", "검사", "운수사업", "신청", "구조변경", "명의", "가입", "해지", "변경"],
                ),
                KeywordGroup::new(
                    "infrastructure",
                    &["충전", "충전소", "주차", "주행", "운행", "배터리", "전기", "충전기", "인프라"],
                ),
                KeywordGroup::new(
                    "maintenance",
                    &[
                        "정비", "수리", "고장", "AS", "A/S", "점검", "보증", "서비스", "교체", "부품", "정기점검", "엔진",
                        "타이어", "오일",
                    ],
                ),
            ],
            fuel_types: vec![
                KeywordGroup::new("electric", &["전기", "전기차", "전기 트럭", "ev", "배터리", "충전", "electric"]),
                KeywordGroup::new("hybrid", &["하이브리드", "hev", "phev", "hybrid"]),
                KeywordGroup::new("diesel", &["디젤", "디젤차", "경유", "diesel"]),
                KeywordGroup::new("gasoline", &["휘발유", "가솔린", "gasoline"]),
                KeywordGroup::new("lpg", &["lpg", "엘피지", "lpg차"]),
                KeywordGroup::new("hydrogen", &["수소", "수소차", "hydrogen", "fcev"]),
                KeywordGroup::new("cng", &["cng", "천연가스", "compressed natural gas"]),
            ],
        }
    }
}

impl Default for VehicleConfig {
    fn default() -> Self {
        let model = |key: &str, id: &str, name: &str, maker: &str, keyword: &str, enabled: bool| VehicleModelConfig {
            key: key.to_string(),
            model_id: id.to_string(),
            name: name.to_string(),
            maker: maker.to_string(),
            search_keyword: keyword.to_string(),
            lineup_ids: Vec::new(),
            enabled,
        };
        Self {
            models: vec![
                model("porter2", "1901", "현대 포터2", "현대", "포터2", true),
                model("porter2_ev", "4399", "현대 포터2 일렉트릭", "현대", "포터2 일렉트릭", true),
                // danawa 모델 ID는 설정 파일에서 지정해야 활성화된다
                model("bongo3", "", "기아 봉고3", "기아", "봉고3", false),
                model("bongo3_ev", "", "기아 봉고3 EV", "기아", "봉고3 EV", false),
            ],
            selectors: VehicleSelectors::default(),
        }
    }
}

impl Default for SourceUrls {
    fn default() -> Self {
        Self {
            opinet_diesel: sources::OPINET_DIESEL.to_string(),
            opinet_lpg: sources::OPINET_LPG.to_string(),
            ev_charge_price: sources::EV_CHARGE_PRICE.to_string(),
            charger_stats: sources::CHARGER_STATS.to_string(),
            molit_stats: sources::MOLIT_STATS.to_string(),
            danawa_model: sources::DANAWA_MODEL.to_string(),
            danawa_search: sources::DANAWA_SEARCH.to_string(),
            registration_stop_marker: defaults::REGISTRATION_STOP_MARKER.to_string(),
            registration_keyword: defaults::REGISTRATION_KEYWORD.to_string(),
        }
    }
}

fn default_faq_sites() -> Vec<FaqSiteConfig> {
    let site = |name: &str,
                url: &str,
                description: &str,
                category: FaqCategory,
                fuel: FuelTag,
                wait_secs: u64,
                strategy: FaqStrategy| FaqSiteConfig {
        name: name.to_string(),
        url: url.to_string(),
        description: description.to_string(),
        default_category: category,
        default_fuel: fuel,
        wait_secs,
        strategy,
        interaction: InteractionMode::Static,
        scroll_to_bottom: false,
    };
    let wordpress = || FaqStrategy::HeadingBody {
        container: ".entry-content".to_string(),
        headings: vec!["h2".to_string(), "h3".to_string(), "h4".to_string()],
    };
    let association_board = || FaqStrategy::DefinitionList {
        question: ".faq_list".to_string(),
        answer: Some("div.faq_answer".to_string()),
        strip_prefix: Some(r"^Q\s*".to_string()),
    };
    let accordion = |item: &str, question: &str, answer: &str, strip: Option<&str>| FaqStrategy::Accordion {
        item: item.to_string(),
        question: question.to_string(),
        answer: answer.to_string(),
        strip_prefix: strip.map(str::to_string),
    };

    let mut kotsa = site(
        "kotsa",
        sources::FAQ_KOTSA,
        "KOTSA (Traffic Safety)",
        FaqCategory::Registration,
        FuelTag::Other,
        3,
        accordion(r#"div[data-bbslist="faq"] > ul > li"#, "a", r#"div[data-bbsbody="conts"]"#, Some(r"^\[.*?\]\s*")),
    );
    kotsa.interaction = InteractionMode::PageJump {
        total: PageTotalSource::RegexText {
            selector: r#"div[data-bbssearch="page"] p"#.to_string(),
            pattern: r"페이지\s*(\d+)/(\d+)".to_string(),
        },
        jump_script: "setPage({page});".to_string(),
        current_page: None,
        content: r#"div[data-bbslist="faq"] ul"#.to_string(),
        expand: None,
        settle_ms: 1000,
    };

    let mut ev = site(
        "ev_or_kr",
        sources::FAQ_EV,
        "EV Charging Infrastructure",
        FaqCategory::Infrastructure,
        FuelTag::Electric,
        2,
        accordion("div.board_faq", ".faq_title > div.title", ".faq_con > div:nth-of-type(2)", None),
    );
    ev.interaction = InteractionMode::PageJump {
        total: PageTotalSource::MaxNumericId {
            selector: "#pageingPosition a[id]".to_string(),
        },
        jump_script: "goPage('statsList', 10, {page});".to_string(),
        current_page: Some("#pageingPosition a.current".to_string()),
        content: "div.board_faq".to_string(),
        expand: Some("div.board_faq .faq_title".to_string()),
        settle_ms: 1000,
    };

    let mut hyundai = site(
        "hyundai",
        sources::FAQ_HYUNDAI,
        "Hyundai Customer Support FAQ",
        FaqCategory::Maintenance,
        FuelTag::Other,
        4,
        accordion("div.result_area div.ui_accordion dl", "dt .brief", "dd .exp", None),
    );
    hyundai.interaction = InteractionMode::NextButton {
        next: "nav.pagination button.navi.next".to_string(),
        content: "div.result_area dl".to_string(),
        settle_ms: defaults::NEXT_PAGE_SETTLE_MS,
    };

    vec![
        site(
            "seoul_news",
            sources::FAQ_SEOUL_NEWS,
            "Seoul Eco-friendly Truck Subsidy",
            FaqCategory::Cost,
            FuelTag::Electric,
            2,
            accordion(".qna_cont", ".qlist a", ".alist", Some(r"^Q\.\s*")),
        ),
        site(
            "navyblog",
            sources::FAQ_NAVYBLOG,
            "Used Truck VAT Refund",
            FaqCategory::Cost,
            FuelTag::Other,
            2,
            wordpress(),
        ),
        site(
            "dabori",
            sources::FAQ_DABORI,
            "Truck Structure Modification",
            FaqCategory::Registration,
            FuelTag::Other,
            2,
            wordpress(),
        ),
        site(
            "kgta",
            sources::FAQ_KGTA,
            "Freight Transport Business License",
            FaqCategory::Registration,
            FuelTag::Other,
            3,
            association_board(),
        ),
        site(
            "seoulta",
            sources::FAQ_SEOULTA,
            "Seoul Trucking Association",
            FaqCategory::Registration,
            FuelTag::Other,
            3,
            association_board(),
        ),
        kotsa,
        ev,
        site(
            "kia",
            sources::FAQ_KIA,
            "Kia EV Charging",
            FaqCategory::Infrastructure,
            FuelTag::Electric,
            3,
            accordion(".cmp-accordion__item", ".cmp-accordion__title", ".cmp-accordion__panel", None),
        ),
        hyundai,
    ]
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(config_dir)
    }

    /// Configuration manager at the default per-user location
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        let config_path = config_dir.join(defaults::CONFIG_FILE_NAME);

        Ok(Self { config_path })
    }

    /// Configuration manager for an explicit file (`--config`)
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!("Configuration file not found, creating default: {:?}", self.config_path);
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("Loaded configuration from: {:?}", self.config_path);
                Ok(config)
            }
            Err(parse_error) => {
                warn!("⚠️  Configuration parse failed: {}", parse_error);
                warn!("⚠️  Resetting to default configuration");

                // Create backup of corrupted config
                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(e) = fs::copy(&self.config_path, &backup_path).await {
                    warn!("Failed to create backup of corrupted config: {}", e);
                } else {
                    info!("Backed up corrupted config to: {:?}", backup_path);
                }

                let default_config = AppConfig::default();
                self.save_config(&default_config)
                    .await
                    .context("Failed to save default configuration")?;

                info!("✅ Reset to default configuration");
                Ok(default_config)
            }
        }
    }

    /// File configuration with `TRUCK_PIPELINE__SECTION__FIELD` environment overrides on top
    pub async fn load_layered(&self) -> Result<AppConfig> {
        let base = self.load_config().await?;
        let has_overrides = std::env::vars().any(|(k, _)| k.starts_with(defaults::ENV_PREFIX));
        if !has_overrides {
            return Ok(base);
        }

        let layered = config::Config::builder()
            .add_source(config::Config::try_from(&base).context("Failed to stage base configuration")?)
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to layer environment overrides")?
            .try_deserialize::<AppConfig>()
            .context("Failed to deserialize layered configuration")?;

        info!("🔧 Applied environment overrides ({}__*)", defaults::ENV_PREFIX);
        Ok(layered)
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        let content = serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Reset configuration to defaults (useful for troubleshooting)
    pub async fn reset_to_defaults(&self) -> Result<AppConfig> {
        info!("🔄 Resetting configuration to defaults");

        let default_config = AppConfig::default();
        self.save_config(&default_config).await?;

        info!("✅ Configuration reset to defaults");
        Ok(default_config)
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }
}

/// Source page URLs
pub mod sources {
    pub const FAQ_SEOUL_NEWS: &str = "https://news.seoul.go.kr/env/archives/517115";
    pub const FAQ_NAVYBLOG: &str = "https://navyblog.kr/중고-화물차-부가세-환급받는-방법2025년-최신-faq-포함/";
    pub const FAQ_DABORI: &str = "https://dabori.co.kr/화물차-적재함-구조변경-필수-faq/";
    pub const FAQ_KGTA: &str = "https://www.kgta.or.kr/board/faq";
    pub const FAQ_SEOULTA: &str = "https://www.seoulta.or.kr/board/faq";
    pub const FAQ_KOTSA: &str = "https://main.kotsa.or.kr/portal/bbs/faq_list.do?menuCode=04010100";
    pub const FAQ_EV: &str = "https://ev.or.kr/nportal/partcptn/initFaqAction.do";
    pub const FAQ_KIA: &str = "https://www.kia.com/kr/vehicles/kia-ev/charging/faq";
    pub const FAQ_HYUNDAI: &str = "https://www.hyundai.com/kr/ko/digital-customer-support/helpdesk/faq";

    /// Regional diesel prices
    pub const OPINET_DIESEL: &str = "https://www.opinet.co.kr/user/dopospdrg/dopOsPdrgAreaView.do";
    /// Regional LPG prices (원/kg)
    pub const OPINET_LPG: &str = "https://www.opinet.co.kr/user/dopcsavsel/dopCsAreaselSelect.do";
    pub const EV_CHARGE_PRICE: &str = "https://ev.or.kr/nportal/evcarInfo/initEvcarChargePrice.do";
    pub const CHARGER_STATS: &str = "https://chargeinfo.ksga.org/front/statistics/charger";
    pub const MOLIT_STATS: &str = "https://stat.molit.go.kr/portal/cate/statMetaView.do?hRsId=58";

    pub const DANAWA_MODEL: &str = "https://auto.danawa.com/auto/?Work=model&Model={model}&Lineup={lineup}&Tab={tab}";
    pub const DANAWA_LINEUPS: &str = "https://auto.danawa.com/auto/?Work=model&Model={model}&Tab=price";
    pub const DANAWA_SEARCH: &str = "https://auto.danawa.com/search/?q={query}";
}

/// Default values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "truck-data-pipeline";
    pub const CONFIG_FILE_NAME: &str = "pipeline_config.json";
    pub const ENV_PREFIX: &str = "TRUCK_PIPELINE";

    pub const DATABASE_URL: &str = "sqlite:data/truck_pipeline.db";

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = true;
    pub const LOG_FILE_NAME: &str = "truck-pipeline.log";
    pub const LOG_MAX_FILES: u32 = 5;
    pub const LOG_AUTO_CLEANUP: bool = true;

    pub const NAVIGATION_TIMEOUT_SECS: u64 = 30;
    pub const ELEMENT_TIMEOUT_SECS: u64 = 15;
    pub const POLL_INTERVAL_MS: u64 = 250;

    /// Settle after a "next" click
    pub const NEXT_PAGE_SETTLE_MS: u64 = 3000;
    /// Settle after expanding accordion titles
    pub const EXPAND_SETTLE_MS: u64 = 1000;
    /// Settle after a danawa page load
    pub const VEHICLE_PAGE_SETTLE_MS: u64 = 3000;
    pub const SEARCH_PAGE_SETTLE_MS: u64 = 2000;
    /// Pause between lineups
    pub const LINEUP_PAUSE_MS: u64 = 1000;
    /// Random extra added to each lineup pause
    pub const LINEUP_PAUSE_JITTER_MS: u64 = 500;
    pub const MARKET_PAGE_SETTLE_MS: u64 = 1000;
    pub const DOWNLOAD_CLICK_PAUSE_MS: u64 = 500;
    pub const DOWNLOAD_FINISH_WAIT_MS: u64 = 2000;

    /// Noise threshold for question text (chars)
    pub const MIN_QUESTION_CHARS: usize = 10;
    /// "No real answer" threshold (chars)
    pub const MIN_ANSWER_CHARS: usize = 20;
    pub const UNAVAILABLE_SENTINEL: &str = "정보 없음";
    /// Answer placeholder of the generic definition-list fallback
    pub const NO_ANSWER_SENTINEL: &str = "답변 없음";
    pub const FALLBACK_ANSWER_SELECTOR: &str = ".answer, .content, dd";

    /// kg price to liter-equivalent price
    pub const LPG_KG_TO_LITER: f64 = 0.584;
    pub const NATIONWIDE_REGION: &str = "전국";

    pub const TEXT_COLUMN_LIMIT: usize = 255;
    pub const CATEGORY_NAME_LIMIT: usize = 10;
    pub const FUEL_TYPE_LIMIT: usize = 20;
    pub const REGION_NAME_LIMIT: usize = 20;

    pub const VEHICLE_SIZE: &str = "소형";
    pub const REGISTRATION_STOP_MARKER: &str = "2015년";
    pub const REGISTRATION_KEYWORD: &str = "자동차 등록";
    pub const REGISTRATION_SHEET_MARKER: &str = "연료별";
    pub const REGISTRATION_DIR: &str = "registered_cars";
}

/// URL building helper functions
pub mod utils {
    use super::sources;
    use url::Url;

    /// danawa model page for one lineup and tab (`spec` or `price`)
    pub fn danawa_model_url(template: &str, model_id: &str, lineup_id: &str, tab: &str) -> String {
        template
            .replace("{model}", model_id)
            .replace("{lineup}", lineup_id)
            .replace("{tab}", tab)
    }

    /// Lineup listing page of a model
    pub fn danawa_lineups_url(model_id: &str) -> String {
        sources::DANAWA_LINEUPS.replace("{model}", model_id)
    }

    /// Search page with the keyword percent-encoded
    pub fn danawa_search_url(template: &str, keyword: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(keyword.as_bytes()).collect();
        // form encoding writes spaces as '+', the search endpoint expects %20
        template.replace("{query}", &encoded.replace('+', "%20"))
    }

    /// Resolve a possibly relative link against the page it came from
    pub fn resolve_url(base: &str, link: &str) -> String {
        Url::parse(base)
            .and_then(|b| b.join(link))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| link.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_catalogue_shape() {
        let config = AppConfig::default();
        assert_eq!(config.faq.sites.len(), 9);
        assert_eq!(config.faq.min_question_chars, 10);
        assert_eq!(config.faq.min_answer_chars, 20);
        assert_eq!(config.classifier.categories[0].label, "cost");
        assert_eq!(config.classifier.fuel_types.last().map(|g| g.label.as_str()), Some("cng"));
    }

    #[test]
    fn test_danawa_urls() {
        assert_eq!(
            utils::danawa_model_url(sources::DANAWA_MODEL, "4399", "53592", "spec"),
            "https://auto.danawa.com/auto/?Work=model&Model=4399&Lineup=53592&Tab=spec"
        );
        assert_eq!(
            utils::danawa_search_url(sources::DANAWA_SEARCH, "봉고3 EV"),
            "https://auto.danawa.com/search/?q=%EB%B4%89%EA%B3%A03%20EV"
        );
        assert_eq!(
            utils::resolve_url("https://auto.danawa.com/search/?q=a", "/photo/1.png"),
            "https://auto.danawa.com/photo/1.png"
        );
    }

    #[tokio::test]
    async fn test_load_creates_default_file() -> Result<()> {
        let dir = tempdir()?;
        let manager = ConfigManager::with_path(dir.path().join("config.json"));

        let config = manager.load_config().await?;
        assert!(manager.config_path().exists());
        assert_eq!(config.database.url, defaults::DATABASE_URL);
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupted_file_is_backed_up() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").await?;

        let manager = ConfigManager::with_path(&path);
        let config = manager.load_config().await?;

        assert_eq!(config.faq.sites.len(), 9);
        assert!(dir.path().join("config.json.corrupted").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"database": {"url": "sqlite::memory:"}}"#).await?;

        let config = ConfigManager::with_path(&path).load_config().await?;
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.logging.level, "info");
        Ok(())
    }
}
