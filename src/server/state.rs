use std::sync::Arc;

use crate::config::SearchOptions;
use crate::gemini::ImageGenerator;
use crate::searcher::FurnitureSearcher;

/// 应用状态
pub struct AppState {
    /// 图片生成客户端
    pub generator: Box<dyn ImageGenerator>,
    /// 家具搜索编排器
    pub searcher: FurnitureSearcher,
    /// 搜索配置选项
    pub search: SearchOptions,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(
        generator: Box<dyn ImageGenerator>,
        searcher: FurnitureSearcher,
        search: SearchOptions,
    ) -> Arc<Self> {
        Arc::new(AppState { generator, searcher, search })
    }
}
