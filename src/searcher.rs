use std::time::Duration;

use image::DynamicImage;
use log::{error, info, warn};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use utoipa::ToSchema;

use crate::clip::ClipClient;
use crate::config::QdrantOptions;
use crate::qdrant::{QdrantClient, ScoredPoint};

/// 查询向量归一化时防止除零的修正量
const NORM_EPSILON: f32 = 1e-8;

#[derive(Debug, Error)]
pub enum SearchError {
    /// 向量库或 embedding 服务未初始化，属于配置/运维问题
    #[error("搜索服务未初始化")]
    Unavailable,
}

/// 家具搜索结果
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchResult {
    /// 余弦相似度，范围 -1..1
    pub score: f32,
    /// 商品名称
    pub title: String,
    /// 价格（原样透传，可能是 "N/A"）
    pub price: String,
    /// 商品来源
    pub source: String,
    /// 商品图片地址
    pub image_url: String,
    /// 可直接粘贴到电商搜索框的关键词
    pub search_query: String,
}

/// 以图搜家具的编排器：远程 CLIP embedding + Qdrant 向量检索
pub struct FurnitureSearcher {
    clip: ClipClient,
    qdrant: Option<QdrantClient>,
}

impl FurnitureSearcher {
    /// 连接 Qdrant 并校验集合
    ///
    /// 配置缺失或连接失败时降级为不可用，而不是让整个进程启动失败
    pub async fn connect(clip: ClipClient, opts: &QdrantOptions) -> Self {
        let (Some(url), Some(api_key)) = (&opts.qdrant_url, &opts.qdrant_api_key) else {
            warn!("未配置 QDRANT_URL 或 QDRANT_API_KEY，家具搜索功能不可用");
            return Self { clip, qdrant: None };
        };
        if !clip.configured() {
            warn!("未配置 CLIP_URL，家具搜索功能不可用");
            return Self { clip, qdrant: None };
        }

        let qdrant = QdrantClient::new(
            url.clone(),
            api_key.clone(),
            opts.qdrant_collection.clone(),
            Duration::from_secs(opts.qdrant_timeout),
        );
        match qdrant.collection_info().await {
            Ok(collection) => {
                info!(
                    "已连接 Qdrant 集合 {}，共 {} 条向量",
                    qdrant.collection(),
                    collection.points_count
                );
                Self { clip, qdrant: Some(qdrant) }
            }
            Err(e) => {
                error!("Qdrant 初始化失败: {e:?}");
                Self { clip, qdrant: None }
            }
        }
    }

    pub fn available(&self) -> bool {
        self.qdrant.is_some()
    }

    /// 触发一次 embedding 端点预热，见 [`ClipClient::warm`]
    pub fn warm(&self, force: bool) -> bool {
        self.clip.warm(force)
    }

    /// 以图搜图，返回最多 top_k 条结果，按相似度降序
    ///
    /// 未初始化时返回 `SearchError::Unavailable`；embedding 或检索阶段的
    /// 失败只记录日志并返回空列表。这两种失败路径的区别是刻意保留的契约：
    /// 前者是运维问题，调用方要提示"服务不可用"；后者按"没搜到"处理。
    pub async fn search(
        &self,
        image: &DynamicImage,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let Some(qdrant) = &self.qdrant else {
            warn!("搜索服务未初始化，无法执行搜索");
            return Err(SearchError::Unavailable);
        };

        let mut vector = match self.clip.get_embedding(image).await {
            Ok(v) => v,
            Err(e) => {
                error!("生成查询向量失败: {e}");
                return Ok(vec![]);
            }
        };
        l2_normalize(&mut vector);

        let points = match qdrant.query(&vector, top_k).await {
            Ok(points) => points,
            Err(e) => {
                error!("查询 Qdrant 失败: {e:?}");
                return Ok(vec![]);
            }
        };

        let results: Vec<_> = points.iter().map(SearchResult::from_point).collect();
        info!("家具搜索返回 {} 条结果", results.len());
        Ok(results)
    }
}

impl SearchResult {
    fn from_point(point: &ScoredPoint) -> Self {
        let title = payload_str(&point.payload, "title")
            .or_else(|| payload_str(&point.payload, "name"))
            .unwrap_or_else(|| "Unknown Item".to_string());
        let source = payload_str(&point.payload, "source").unwrap_or_default();
        Self {
            score: point.score,
            search_query: format!("{title} {source}"),
            price: payload_str(&point.payload, "price").unwrap_or_else(|| "N/A".to_string()),
            image_url: payload_str(&point.payload, "image_url").unwrap_or_default(),
            title,
            source,
        }
    }
}

/// 除以 L2 范数（加一个小修正量避免除零）
fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt() + NORM_EPSILON;
    for x in v.iter_mut() {
        *x /= norm;
    }
}

/// 从 payload 里取字符串字段，数字会转成字符串
fn payload_str(payload: &Map<String, Value>, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
