use crate::error::{AppResult, ConfigError};
use crate::models::{load_subject_vocabulary, SubjectVocabulary};
use std::path::PathBuf;
use std::str::FromStr;

/// 表头抽取并发数上限，避免压垮 Oracle 服务
pub const MAX_HEADER_WORKERS: usize = 500;

/// 每个科目默认最多请求几次分组
pub const DEFAULT_GROUPING_ATTEMPTS: usize = 3;

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 考试文件根目录（每个子目录是一个科目）
    pub exams_root: PathBuf,
    /// 表头抽取 worker 数量
    pub header_workers: usize,
    /// 单个科目分组的最大尝试次数
    pub max_grouping_attempts: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 失败记录文件
    pub warn_file: String,
    // --- 检查点与输出 ---
    pub header_checkpoint_path: PathBuf,
    pub subject_checkpoint_path: PathBuf,
    pub grouping_output_path: PathBuf,
    pub database_path: PathBuf,
    /// 可选的科目词表 TOML 文件
    pub subjects_file: Option<PathBuf>,
    /// 科目词表
    pub subjects: SubjectVocabulary,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub oracle_max_retries: u32,
    pub oracle_retry_base_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exams_root: PathBuf::from("../../exams/markdown"),
            header_workers: 64,
            max_grouping_attempts: DEFAULT_GROUPING_ATTEMPTS,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            warn_file: "warn.txt".to_string(),
            header_checkpoint_path: PathBuf::from("file_header_mapping.jsonl"),
            subject_checkpoint_path: PathBuf::from("year_subject_mapping.json"),
            grouping_output_path: PathBuf::from("../exam_mapping.json"),
            database_path: PathBuf::from("db.sqlite3"),
            subjects_file: None,
            subjects: SubjectVocabulary::default(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            llm_model_name: "gemini-2.5-flash-lite".to_string(),
            oracle_max_retries: 3,
            oracle_retry_base_delay_ms: 2000,
        }
    }
}

impl Config {
    /// 从环境变量（以及当前目录下的 `.env`）加载配置
    ///
    /// 缺少 `LLM_API_KEY` 时直接失败
    pub async fn from_env() -> AppResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("已加载 {}", path.display());
        }

        let default = Self::default();

        let llm_api_key = std::env::var("LLM_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::EnvVarNotFound {
                var_name: "LLM_API_KEY".to_string(),
            })?;

        let header_workers: usize = parse_var("HEADER_WORKERS", default.header_workers)?;
        let subjects_file = std::env::var("SUBJECTS_FILE").ok().map(PathBuf::from);
        let subjects = match &subjects_file {
            Some(path) => load_subject_vocabulary(path).await?,
            None => default.subjects,
        };

        Ok(Self {
            exams_root: path_var("EXAMS_ROOT", default.exams_root),
            header_workers: header_workers.clamp(1, MAX_HEADER_WORKERS),
            max_grouping_attempts: parse_var("MAX_GROUPING_ATTEMPTS", default.max_grouping_attempts)?
                .max(1),
            verbose_logging: parse_var("VERBOSE_LOGGING", default.verbose_logging)?,
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            warn_file: std::env::var("WARN_FILE").unwrap_or(default.warn_file),
            header_checkpoint_path: path_var("HEADER_CHECKPOINT_PATH", default.header_checkpoint_path),
            subject_checkpoint_path: path_var(
                "SUBJECT_CHECKPOINT_PATH",
                default.subject_checkpoint_path,
            ),
            grouping_output_path: path_var("GROUPING_OUTPUT_PATH", default.grouping_output_path),
            database_path: path_var("DATABASE_PATH", default.database_path),
            subjects_file,
            subjects,
            llm_api_key,
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            oracle_max_retries: parse_var("ORACLE_MAX_RETRIES", default.oracle_max_retries)?,
            oracle_retry_base_delay_ms: parse_var(
                "ORACLE_RETRY_BASE_DELAY_MS",
                default.oracle_retry_base_delay_ms,
            )?,
        })
    }
}

fn path_var(name: &str, default: PathBuf) -> PathBuf {
    std::env::var(name).map(PathBuf::from).unwrap_or(default)
}

/// 已设置但无法解析的变量视为配置错误，而不是静默回退到默认值
fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: name.to_string(),
                value,
                expected_type: std::any::type_name::<T>().to_string(),
            })
        }
        Err(_) => Ok(default),
    }
}
