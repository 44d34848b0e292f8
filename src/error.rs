use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// Oracle 调用错误
    #[error("Oracle错误: {0}")]
    Oracle(#[from] OracleError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 数据库错误
    #[error("数据库错误: {0}")]
    Persistence(#[from] PersistenceError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// Oracle（结构化抽取服务）错误
#[derive(Debug, Error)]
pub enum OracleError {
    /// 网络请求失败
    #[error("请求失败 (模型: {model}): {source}")]
    RequestFailed {
        model: String,
        #[source]
        source: reqwest::Error,
    },
    /// 服务返回非成功状态码
    #[error("服务返回错误 (状态码: {status}): {body}")]
    BadStatus { status: u16, body: String },
    /// 返回结果为空
    #[error("返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 返回内容不符合声明的结构
    #[error("响应不符合 schema ({schema}): {source}")]
    SchemaMismatch {
        schema: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// 返回了词表之外的科目
    #[error("未知科目: {subject}")]
    UnknownSubject { subject: String },
    /// 重试次数耗尽
    #[error("已重试 {attempts} 次仍然失败: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<OracleError>,
    },
}

impl OracleError {
    /// 是否值得重试
    ///
    /// 4xx（除 429）说明请求本身有问题，重试没有意义
    pub fn is_retryable(&self) -> bool {
        match self {
            OracleError::RequestFailed { .. }
            | OracleError::EmptyContent { .. }
            | OracleError::SchemaMismatch { .. }
            | OracleError::UnknownSubject { .. } => true,
            OracleError::BadStatus { status, .. } => *status == 429 || *status >= 500,
            OracleError::RetriesExhausted { .. } => false,
        }
    }
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 目录不存在或无法遍历
    #[error("无法遍历目录 ({path}): {source}")]
    WalkFailed {
        path: String,
        #[source]
        source: walkdir::Error,
    },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 检查点内容损坏
    #[error("检查点解析失败 ({path}): {source}")]
    CheckpointCorrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 目录树工具执行失败
    #[error("目录树生成失败 ({path}): {reason}")]
    ListingFailed { path: String, reason: String },
}

/// 数据库错误
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// SQLite 执行失败
    #[error("SQL 执行失败 ({operation}): {source}")]
    Sql {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    /// 引用了不在词表中的科目
    #[error("科目不在词表中: {subject}")]
    UnknownSubject { subject: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 环境变量不存在
    #[error("环境变量 {var_name} 不存在")]
    EnvVarNotFound { var_name: String },
    /// 科目词表为空
    #[error("科目词表为空: {path}")]
    EmptyVocabulary { path: String },
}

// ========== 便捷构造函数 ==========

impl FileError {
    pub fn read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        FileError::ReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        FileError::WriteFailed {
            path: path.into(),
            source,
        }
    }
}

impl PersistenceError {
    pub fn sql(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| PersistenceError::Sql { operation, source }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
