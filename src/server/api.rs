use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::Html;
use axum_typed_multipart::TypedMultipart;
use log::{debug, info};

use super::error::{ApiError, Result};
use super::state::AppState;
use super::types::*;
use crate::imgutil;
use crate::redesign::{self, RedesignMode};
use crate::searcher::SearchError;

/// 允许上传的图片格式
const ALLOWED_MIME: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// 首页，给出接口用法
pub async fn index_handler() -> Html<&'static str> {
    Html(
        r#"
        <p>
        http --form http://127.0.0.1:8000/api/redesign file@room.jpg style=Nordic room_type='Living Room'</br>
        http post http://127.0.0.1:8000/api/refine image_data='data:image/png;base64,...' prompt='make the rug blue'</br>
        http post http://127.0.0.1:8000/api/search-furniture image_data='data:image/png;base64,...' box:='{"x":0,"y":0,"width":100,"height":100}'</br>
        接口文档见 <a href="/docs">/docs</a>
        </p>
        "#,
    )
}

/// 重设计一张房间照片
#[utoipa::path(
    post,
    path = "/api/redesign",
    request_body(content = RedesignForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = RedesignResponse),
    )
)]
pub async fn redesign_handler(
    State(state): State<Arc<AppState>>,
    data: TypedMultipart<RedesignRequest>,
) -> Result<Json<RedesignResponse>> {
    let Some(file) = &data.file else {
        return Err(ApiError::BadRequest("未上传图片".to_string()));
    };
    if file.is_empty() {
        return Err(ApiError::BadRequest("图片内容为空".to_string()));
    }
    // 从字节内容检测真实格式，不信任客户端声明的 content-type
    let mime = imgutil::detect_mime(file);
    if !ALLOWED_MIME.contains(&mime) {
        return Err(ApiError::BadRequest(format!(
            "不支持的图片格式: {mime}，仅支持 JPEG/PNG/WebP"
        )));
    }

    let style =
        data.style.as_deref().map(str::trim).filter(|s| !s.is_empty()).unwrap_or("Nordic");
    let room_type = data
        .room_type
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("Living Room");
    let additions = data.additional_instructions.as_deref().unwrap_or("");
    let mode = RedesignMode::from_flag(data.empty_then_generate.as_deref());

    // 用户通常会紧接着搜索家具，顺手预热 embedding 端点
    state.searcher.warm(false);

    info!("正在重设计: style={style}, room_type={room_type}, mode={mode:?}");
    let result =
        redesign::redesign(state.generator.as_ref(), file, style, room_type, additions, mode)
            .await
            .map_err(|e| ApiError::Failed(e.to_string()))?;

    Ok(Json(RedesignResponse {
        original_image: imgutil::to_data_uri(file),
        empty_image: imgutil::to_data_uri(&result.before),
        final_image: imgutil::to_data_uri(&result.after),
    }))
}

/// 对现有设计做局部修改
#[utoipa::path(
    post,
    path = "/api/refine",
    request_body = RefineRequest,
    responses(
        (status = 200, body = RefineResponse),
    )
)]
pub async fn refine_handler(
    State(state): State<Arc<AppState>>,
    Json(data): Json<RefineRequest>,
) -> Result<Json<RefineResponse>> {
    if data.image_data.is_empty() {
        return Err(ApiError::BadRequest("缺少图片数据".to_string()));
    }
    let prompt = data.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::BadRequest("缺少修改指令".to_string()));
    }
    let input = imgutil::from_data_uri(&data.image_data)
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| ApiError::BadRequest("无效的图片".to_string()))?;

    info!("正在微调设计");
    let refined = redesign::refine(state.generator.as_ref(), &input, prompt)
        .await
        .ok_or_else(|| ApiError::Failed("微调失败".to_string()))?;

    Ok(Json(RefineResponse { refined_image: imgutil::to_data_uri(&refined) }))
}

/// 用图片局部搜索相似家具
#[utoipa::path(
    post,
    path = "/api/search-furniture",
    request_body = SearchRequest,
    responses(
        (status = 200, body = SearchResponse),
        (status = 503, description = "搜索服务未初始化"),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(data): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    if data.image_data.is_empty() {
        return Err(ApiError::BadRequest("缺少图片数据".to_string()));
    }
    if data.crop.width <= 0.0 || data.crop.height <= 0.0 {
        return Err(ApiError::BadRequest("裁剪区域的宽高必须为正数".to_string()));
    }

    let bytes = imgutil::from_data_uri(&data.image_data)
        .ok_or_else(|| ApiError::BadRequest("图片处理失败".to_string()))?;
    let full = image::load_from_memory(&bytes).map_err(|e| {
        debug!("解码搜索图片失败: {e}");
        ApiError::BadRequest("图片处理失败".to_string())
    })?;

    // 裁剪后等比缩放并填充到模型期望的方形输入
    let cropped =
        imgutil::crop_image(&full, data.crop.x, data.crop.y, data.crop.width, data.crop.height);
    let query = imgutil::letterbox(&cropped, imgutil::QUERY_SIZE);

    let results = match state.searcher.search(&query, state.search.count).await {
        Ok(results) => results,
        Err(SearchError::Unavailable) => {
            return Err(ApiError::Unavailable(
                "搜索服务不可用：向量库或 embedding 服务未就绪".to_string(),
            ));
        }
    };
    Ok(Json(SearchResponse { results }))
}
