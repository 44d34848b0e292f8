/// Oracle 客户端
///
/// 封装对 OpenAI 兼容 `/chat/completions` 接口的结构化抽取调用：
/// 请求带 `response_format: json_schema`，返回内容按 schema 解析，
/// 传输错误和解析错误按指数退避重试。
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::clients::schemas;
use crate::config::Config;
use crate::error::OracleError;
use crate::models::{GroupingProposal, HeaderMetadata, SubjectVocabulary, SubjectYear};

/// 一次成功调用的结果和本次消耗的 token 数
#[derive(Debug, Clone, PartialEq)]
pub struct OracleReply<T> {
    pub value: T,
    pub usage: u64,
}

/// 结构化抽取服务
///
/// 流水线只依赖这个 trait，测试里用脚本化的实现替换真实服务
#[async_trait]
pub trait Oracle: Send + Sync {
    /// 目录树 → 分组方案
    async fn propose_grouping(&self, listing: &str) -> Result<OracleReply<GroupingProposal>, OracleError>;

    /// 表头文本 → 表头元数据
    async fn extract_header_metadata(&self, snippet: &str) -> Result<OracleReply<HeaderMetadata>, OracleError>;

    /// 目录名 → 科目和年份
    async fn resolve_subject_year(&self, directory_name: &str) -> Result<OracleReply<SubjectYear>, OracleError>;

    /// 本次运行累计消耗的 token 数（包括失败的尝试）
    fn total_usage(&self) -> u64;
}

/// token 计数器，多个并发请求共享
#[derive(Debug, Default)]
pub struct UsageMeter {
    tokens: AtomicU64,
}

impl UsageMeter {
    pub fn record(&self, tokens: u64) {
        self.tokens.fetch_add(tokens, Ordering::Relaxed);
    }

    pub fn tokens(&self) -> u64 {
        self.tokens.load(Ordering::Relaxed)
    }
}

// ========== 请求/响应结构 ==========

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    strict: bool,
    schema: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: u64,
}

/// 真实的 Oracle 客户端
pub struct OracleClient {
    client: Client,
    api_key: String,
    api_base_url: String,
    model_name: String,
    vocabulary: SubjectVocabulary,
    max_retries: u32,
    retry_base_delay: Duration,
    usage: UsageMeter,
}

impl OracleClient {
    /// 创建新的 Oracle 客户端
    pub fn new(config: &Config) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| OracleError::RequestFailed {
                model: config.llm_model_name.clone(),
                source: e,
            })?;

        Ok(Self {
            client,
            api_key: config.llm_api_key.clone(),
            api_base_url: config.llm_api_base_url.trim_end_matches('/').to_string(),
            model_name: config.llm_model_name.clone(),
            vocabulary: config.subjects.clone(),
            max_retries: config.oracle_max_retries,
            retry_base_delay: Duration::from_millis(config.oracle_retry_base_delay_ms),
            usage: UsageMeter::default(),
        })
    }

    /// 发送一次请求，返回原始 JSON 文本和 token 数
    async fn request_once(
        &self,
        schema_name: &'static str,
        schema: &Value,
        prompt: &str,
    ) -> Result<(String, u64), OracleError> {
        debug!("正在调用 Oracle，模型: {} | schema: {}", self.model_name, schema_name);

        let request = ChatRequest {
            model: &self.model_name,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: schema_name,
                    strict: true,
                    schema: schema.clone(),
                },
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.request_failed(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| self.request_failed(e))?;

        let tokens = parsed.usage.map(|u| u.total_tokens).unwrap_or(0);
        self.usage.record(tokens);

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| OracleError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        debug!("Oracle 调用成功，消耗 {} tokens", tokens);
        Ok((content, tokens))
    }

    fn request_failed(&self, source: reqwest::Error) -> OracleError {
        OracleError::RequestFailed {
            model: self.model_name.clone(),
            source,
        }
    }

    /// 请求并按 schema 解析
    async fn complete<T: DeserializeOwned>(
        &self,
        schema_name: &'static str,
        schema: &Value,
        prompt: &str,
    ) -> Result<OracleReply<T>, OracleError> {
        let (content, usage) = self.request_once(schema_name, schema, prompt).await?;
        let value = parse_content(schema_name, &content)?;
        Ok(OracleReply { value, usage })
    }
}

#[async_trait]
impl Oracle for OracleClient {
    async fn propose_grouping(&self, listing: &str) -> Result<OracleReply<GroupingProposal>, OracleError> {
        let schema = schemas::grouping_schema(&self.vocabulary);
        let prompt = schemas::grouping_prompt(listing);

        with_retries(self.max_retries, self.retry_base_delay, "分组", || async {
            let mut reply: OracleReply<GroupingProposal> = self
                .complete(schemas::GROUPING_SCHEMA_NAME, &schema, &prompt)
                .await?;
            reply.value.friendly_subject_name =
                canonical_subject(&self.vocabulary, &reply.value.friendly_subject_name)?;
            Ok(reply)
        })
        .await
    }

    async fn extract_header_metadata(&self, snippet: &str) -> Result<OracleReply<HeaderMetadata>, OracleError> {
        let schema = schemas::header_schema();
        let prompt = schemas::header_prompt(snippet);

        with_retries(self.max_retries, self.retry_base_delay, "表头", || {
            self.complete(schemas::HEADER_SCHEMA_NAME, &schema, &prompt)
        })
        .await
    }

    async fn resolve_subject_year(&self, directory_name: &str) -> Result<OracleReply<SubjectYear>, OracleError> {
        let schema = schemas::subject_year_schema(&self.vocabulary);
        let prompt = schemas::subject_year_prompt(directory_name);

        with_retries(self.max_retries, self.retry_base_delay, "科目", || async {
            let mut reply: OracleReply<SubjectYear> = self
                .complete(schemas::SUBJECT_YEAR_SCHEMA_NAME, &schema, &prompt)
                .await?;
            reply.value.subject_name = canonical_subject(&self.vocabulary, &reply.value.subject_name)?;
            Ok(reply)
        })
        .await
    }

    fn total_usage(&self) -> u64 {
        self.usage.tokens()
    }
}

/// 解析返回的 JSON 文本
fn parse_content<T: DeserializeOwned>(schema_name: &'static str, content: &str) -> Result<T, OracleError> {
    serde_json::from_str(content.trim()).map_err(|e| OracleError::SchemaMismatch {
        schema: schema_name,
        source: e,
    })
}

/// 把 Oracle 返回的科目名映射到词表中的标准写法
pub fn canonical_subject(vocabulary: &SubjectVocabulary, name: &str) -> Result<String, OracleError> {
    vocabulary
        .find(name)
        .map(str::to_string)
        .ok_or_else(|| OracleError::UnknownSubject {
            subject: name.to_string(),
        })
}

/// 第 `retry` 次重试前的等待时间（从 1 开始）
pub fn backoff_delay(base: Duration, retry: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
}

/// 按指数退避重试
///
/// 不可重试的错误立即返回；重试耗尽后包装成 `RetriesExhausted`
pub async fn with_retries<T, F, Fut>(
    max_retries: u32,
    base_delay: Duration,
    label: &str,
    mut operation: F,
) -> Result<T, OracleError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OracleError>>,
{
    let mut retry = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if retry >= max_retries => {
                return Err(OracleError::RetriesExhausted {
                    attempts: retry + 1,
                    last: Box::new(e),
                })
            }
            Err(e) => {
                retry += 1;
                let delay = backoff_delay(base_delay, retry);
                warn!(
                    "⚠️ Oracle {}请求失败: {} ({:?} 后重试 {}/{})",
                    label, e, delay, retry, max_retries
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_usage_meter_accumulates() {
        let meter = UsageMeter::default();
        meter.record(15);
        meter.record(27);
        assert_eq!(meter.tokens(), 42);
    }

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 4), Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_with_retries_recovers() {
        let calls = AtomicU32::new(0);
        let result = with_retries(3, Duration::from_millis(1), "测试", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(OracleError::EmptyContent {
                    model: "m".to_string(),
                })
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retries_exhausts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(2, Duration::from_millis(1), "测试", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(OracleError::BadStatus {
                status: 503,
                body: String::new(),
            })
        })
        .await;

        assert!(matches!(
            result,
            Err(OracleError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retries_stops_on_client_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(5, Duration::from_millis(1), "测试", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(OracleError::BadStatus {
                status: 401,
                body: "bad key".to_string(),
            })
        })
        .await;

        assert!(matches!(result, Err(OracleError::BadStatus { status: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parse_content_schema_mismatch() {
        let err = parse_content::<HeaderMetadata>("header", "{\"exam_type\": 1}").unwrap_err();
        assert!(matches!(err, OracleError::SchemaMismatch { schema: "header", .. }));
    }

    #[test]
    fn test_canonical_subject() {
        let vocabulary = SubjectVocabulary::new(["Volkswirtschaft"]);
        assert_eq!(
            canonical_subject(&vocabulary, "volkswirtschaft").unwrap(),
            "Volkswirtschaft"
        );
        assert!(canonical_subject(&vocabulary, "VW").is_err());
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "gemini-2.5-flash-lite",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi".to_string(),
            }],
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: "file_header",
                    strict: true,
                    schema: schemas::header_schema(),
                },
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_schema");
        assert_eq!(value["response_format"]["json_schema"]["name"], "file_header");
    }

    #[test]
    fn test_response_usage_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"{}"}}],
                      "usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.usage.unwrap().total_tokens, 15);
    }
}
