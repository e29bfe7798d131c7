use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;
use std::env;

/// Default buffer distance (map units, EPSG:27700 metres) applied around a
/// street geometry when deriving the land-use query bounding box.
const DEFAULT_BUFFER_DISTANCE: f64 = 50.0;

#[derive(Debug, Deserialize, Clone)]
pub struct CommonConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl CommonConfig {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub common: CommonConfig,
    pub ngd: NgdConfig,
    pub warehouse: WarehouseConfig,
    pub openai: OpenAiConfig,
}

#[derive(Debug, Clone)]
pub struct NgdConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// DuckDB connection string: an `md:` MotherDuck URL in production or a
    /// local database file path.
    pub database_url: String,
    pub usrn_schema: String,
    pub usrn_table: String,
    pub street_manager_schema: String,
    pub completed_works_table: String,
    pub in_progress_works_table: String,
    pub work_summary_schema: String,
    /// Fully qualified SWA-code reference table used for promoter sector
    /// classification.
    pub swa_codes_table: String,
    pub buffer_distance: f64,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub speech_model: String,
    pub temperature: f32,
}

impl ServiceConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = CommonConfig::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(ServiceConfig {
            common,
            ngd: NgdConfig {
                api_key: get_env("OS_KEY", None, is_prod)?,
                base_url: get_env(
                    "NGD_BASE_URL",
                    Some("https://api.os.uk/features/ngd/ofa/v1"),
                    is_prod,
                )?,
            },
            warehouse: WarehouseConfig {
                database_url: warehouse_database_url(is_prod)?,
                usrn_schema: get_env("USRN_SCHEMA", Some("os_open_usrns"), is_prod)?,
                usrn_table: get_env("USRN_TABLE", Some("latest"), is_prod)?,
                street_manager_schema: get_env(
                    "STREETMANAGER_SCHEMA",
                    Some("street_manager"),
                    is_prod,
                )?,
                completed_works_table: get_env(
                    "STREETMANAGER_TABLE_COMPLETED",
                    Some("completed_works"),
                    is_prod,
                )?,
                in_progress_works_table: get_env(
                    "STREETMANAGER_TABLE_IN_PROGRESS",
                    Some("in_progress_works"),
                    is_prod,
                )?,
                work_summary_schema: get_env("WORK_SUMMARY_SCHEMA", Some("work_summary"), is_prod)?,
                swa_codes_table: get_env(
                    "SWA_CODES_TABLE",
                    Some("geoplace_swa_codes.LATEST_ACTIVE"),
                    is_prod,
                )?,
                buffer_distance: get_env(
                    "BBOX_BUFFER_DISTANCE",
                    Some(&DEFAULT_BUFFER_DISTANCE.to_string()),
                    is_prod,
                )?
                .parse()
                .unwrap_or(DEFAULT_BUFFER_DISTANCE),
            },
            openai: OpenAiConfig {
                api_key: get_env("OPENAI_API_KEY", None, is_prod)?,
                base_url: get_env("OPENAI_BASE_URL", Some("https://api.openai.com/v1"), is_prod)?,
                text_model: get_env("OPENAI_TEXT_MODEL", Some("gpt-4o-mini"), is_prod)?,
                speech_model: get_env(
                    "OPENAI_SPEECH_MODEL",
                    Some("gpt-4o-mini-tts"),
                    is_prod,
                )?,
                temperature: get_env("OPENAI_TEMPERATURE", Some("0.3"), is_prod)?
                    .parse()
                    .unwrap_or(0.3),
            },
        })
    }
}

/// The warehouse connection string: an explicit `WAREHOUSE_DATABASE_URL`
/// wins; otherwise it is composed from the MotherDuck database name and
/// token.
fn warehouse_database_url(is_prod: bool) -> Result<String, AppError> {
    if let Ok(url) = env::var("WAREHOUSE_DATABASE_URL") {
        return Ok(url);
    }

    let database = get_env("MD_DB", Some("street_insight"), is_prod)?;
    let token = get_env("MD_TOKEN", Some(""), is_prod)?;

    Ok(format!("md:{}?motherduck_token={}", database, token))
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
