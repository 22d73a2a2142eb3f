use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Qdrant REST 客户端，只覆盖本项目用到的两个接口
#[derive(Clone)]
pub struct QdrantClient {
    client: Client,
    base: String,
    api_key: String,
    collection: String,
    timeout: Duration,
}

/// 集合概要
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionInfo {
    #[serde(default)]
    pub points_count: u64,
}

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    result: CollectionInfo,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    result: QueryResult,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    points: Vec<ScoredPoint>,
}

/// 单条检索命中，payload 为商品元数据
#[derive(Debug, Deserialize)]
pub struct ScoredPoint {
    pub score: f32,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl QdrantClient {
    pub fn new(url: String, api_key: String, collection: String, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base: url.trim_end_matches('/').to_string(),
            api_key,
            collection,
            timeout,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// 获取集合信息，启动时用来校验连接和集合是否存在
    pub async fn collection_info(&self) -> Result<CollectionInfo> {
        let url = format!("{}/collections/{}", self.base, self.collection);
        let resp = self
            .client
            .get(&url)
            .header("api-key", &self.api_key)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        let body: CollectionResponse = resp.json().await?;
        Ok(body.result)
    }

    /// 查询与给定向量最相似的 limit 条记录，按相似度降序返回
    pub async fn query(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>> {
        let url = format!("{}/collections/{}/points/query", self.base, self.collection);
        let request = QueryRequest { query: vector, limit, with_payload: true };
        let resp = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let body: QueryResponse = resp.json().await?;
        Ok(body.result.points)
    }
}
