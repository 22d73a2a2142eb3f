use clap::Parser;
use log::{info, warn};
use tokio::net::TcpListener;

use crate::cli::SubCommandExtend;
use crate::clip::ClipClient;
use crate::config::{ClipOptions, GeminiOptions, Opts, QdrantOptions, SearchOptions};
use crate::gemini::GeminiClient;
use crate::searcher::FurnitureSearcher;
use crate::server;

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub gemini: GeminiOptions,
    #[command(flatten)]
    pub clip: ClipOptions,
    #[command(flatten)]
    pub qdrant: QdrantOptions,
    #[command(flatten)]
    pub search: SearchOptions,
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub addr: String,
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, _opts: &Opts) -> anyhow::Result<()> {
        // 缺少 GOOGLE_API_KEY 直接启动失败；搜索相关配置缺失只降级搜索功能
        let generator = GeminiClient::new(&self.gemini)?;

        let clip = ClipClient::new(&self.clip);
        let searcher = FurnitureSearcher::connect(clip, &self.qdrant).await;
        if searcher.available() {
            // 启动时强制预热一次，减少第一个搜索请求的冷启动延迟
            searcher.warm(true);
        } else {
            warn!("搜索服务初始化失败，家具搜索接口将返回 503");
        }

        // 创建应用状态
        let state = server::AppState::new(Box::new(generator), searcher, self.search.clone());

        // 创建应用
        let app = server::create_app(state);

        // 启动服务器
        info!("服务器启动：http://{}", &self.addr);
        let listener = TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
