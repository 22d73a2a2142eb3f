use axum::body::Bytes;
use axum_typed_multipart::TryFromMultipart;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::searcher::SearchResult;

/// 重设计请求参数
#[derive(TryFromMultipart)]
pub struct RedesignRequest {
    pub file: Option<Bytes>,
    pub style: Option<String>,
    pub room_type: Option<String>,
    pub additional_instructions: Option<String>,
    pub empty_then_generate: Option<String>,
}

/// 重设计表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct RedesignForm {
    /// 上传的房间照片，支持 JPEG/PNG/WebP
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// 设计风格，默认 Nordic
    pub style: Option<String>,
    /// 房间类型，默认 Living Room
    pub room_type: Option<String>,
    /// 额外的自由文本要求
    pub additional_instructions: Option<String>,
    /// 是否先清空房间再生成，接受 true/1/yes
    pub empty_then_generate: Option<String>,
}

/// 重设计响应，图片均为 data URI
#[derive(Debug, Serialize, ToSchema)]
pub struct RedesignResponse {
    /// 用户上传的原图
    pub original_image: String,
    /// "改造前"对比图：两步模式下为清空后的房间，否则为原图
    pub empty_image: String,
    /// 最终设计图
    pub final_image: String,
}

/// 微调请求
#[derive(Debug, Deserialize, ToSchema)]
pub struct RefineRequest {
    /// 待微调图片的 data URI
    pub image_data: String,
    /// 修改指令
    pub prompt: String,
}

/// 微调响应
#[derive(Debug, Serialize, ToSchema)]
pub struct RefineResponse {
    pub refined_image: String,
}

/// 裁剪区域，单位为原图像素
#[derive(Debug, Deserialize, ToSchema)]
pub struct CropBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// 家具搜索请求
#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchRequest {
    /// 全图的 data URI
    pub image_data: String,
    /// 用户框选的裁剪区域
    #[serde(rename = "box")]
    pub crop: CropBox,
}

/// 家具搜索响应
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    /// 匹配的商品，按相似度降序
    pub results: Vec<SearchResult>,
}
