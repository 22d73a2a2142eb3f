use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use image::DynamicImage;
use log::{debug, info};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use thiserror::Error;

use crate::config::ClipOptions;
use crate::imgutil;

/// CLIP embedding 的固定维度
pub const EMBEDDING_DIM: usize = 512;

/// 预热请求的最短超时
const WARM_TIMEOUT_FLOOR: Duration = Duration::from_secs(5);

/// embedding 客户端错误
#[derive(Debug, Error)]
pub enum ClipError {
    #[error("未配置 CLIP 推理服务地址")]
    NotConfigured,
    /// 响应缺少 embedding 字段或向量长度不等于 512
    #[error("embedding 响应形状错误: {0}")]
    BadShape(String),
    #[error("图片编码失败: {0}")]
    Encode(#[from] image::ImageError),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// 远程 CLIP 推理服务客户端
///
/// 服务端接受原始图片字节，返回 `{"embedding": [512 个浮点数]}`，
/// 部分部署会把向量再包一层数组，解析时做单层解包。
#[derive(Clone)]
pub struct ClipClient {
    client: Client,
    url: Option<String>,
    timeout: Duration,
    warm_interval: Duration,
    last_warm: Arc<Mutex<Option<Instant>>>,
}

impl ClipClient {
    pub fn new(opts: &ClipOptions) -> Self {
        if opts.clip_url.is_none() {
            debug!("未配置 CLIP_URL，embedding 客户端处于禁用状态");
        }
        Self {
            client: Client::new(),
            url: opts.clip_url.clone(),
            timeout: Duration::from_secs(opts.clip_timeout),
            warm_interval: Duration::from_secs(opts.warm_interval),
            last_warm: Arc::new(Mutex::new(None)),
        }
    }

    pub fn configured(&self) -> bool {
        self.url.is_some()
    }

    /// 把图片归一化为 RGB JPEG 后发送，返回 512 维向量
    pub async fn get_embedding(&self, image: &DynamicImage) -> Result<Vec<f32>, ClipError> {
        let url = self.url.as_deref().ok_or(ClipError::NotConfigured)?;
        let body = imgutil::to_rgb_jpeg(image)?;

        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .timeout(self.timeout)
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        let payload: Value = resp.json().await?;

        let embedding = payload
            .get("embedding")
            .ok_or_else(|| ClipError::BadShape("缺少 embedding 字段".to_string()))?;
        let outer = embedding
            .as_array()
            .ok_or_else(|| ClipError::BadShape("embedding 不是数组".to_string()))?;
        // 兼容 [[...]] 形式的单元素嵌套
        let values = match outer.as_slice() {
            [Value::Array(inner)] => inner.as_slice(),
            _ => outer.as_slice(),
        };

        let vector = values
            .iter()
            .map(|v| v.as_f64().map(|x| x as f32))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ClipError::BadShape("embedding 含有非数值元素".to_string()))?;
        if vector.len() != EMBEDDING_DIM {
            return Err(ClipError::BadShape(format!(
                "向量长度 {} != {EMBEDDING_DIM}",
                vector.len()
            )));
        }
        Ok(vector)
    }

    /// 发送一个 1×1 图片请求为托管端点预热，降低冷启动延迟
    ///
    /// 请求在独立任务中发出，不会阻塞或影响调用方；
    /// 非强制模式下按时间间隔节流。返回是否真的发出了预热请求。
    pub fn warm(&self, force: bool) -> bool {
        let Some(url) = self.url.clone() else {
            return false;
        };
        if !force && !self.warm_due() {
            return false;
        }

        let client = self.client.clone();
        let timeout = self.timeout.max(WARM_TIMEOUT_FLOOR);
        let last_warm = Arc::clone(&self.last_warm);
        tokio::spawn(async move {
            let Ok(probe) = imgutil::warm_probe_jpeg() else {
                return;
            };
            let result = client
                .post(&url)
                .header(CONTENT_TYPE, "application/octet-stream")
                .timeout(timeout)
                .body(probe)
                .send()
                .await
                .and_then(|r| r.error_for_status());
            match result {
                Ok(resp) => info!("CLIP 预热成功 (status={})", resp.status()),
                Err(e) => debug!("CLIP 预热失败: {e}"),
            }
            if let Ok(mut t) = last_warm.lock() {
                *t = Some(Instant::now());
            }
        });
        true
    }

    fn warm_due(&self) -> bool {
        match self.last_warm.lock() {
            Ok(guard) => guard.is_none_or(|t| t.elapsed() >= self.warm_interval),
            // 拿不到锁就跳过这一次
            Err(_) => false,
        }
    }
}
