use std::fs;
use std::path::PathBuf;

use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::{GeminiOptions, Opts};
use crate::gemini::GeminiClient;
use crate::redesign::{self, RedesignMode};

#[derive(Parser, Debug, Clone)]
pub struct RedesignCommand {
    #[command(flatten)]
    pub gemini: GeminiOptions,
    /// 房间照片路径
    pub image: PathBuf,
    /// 设计风格
    #[arg(long, default_value = "Nordic")]
    pub style: String,
    /// 房间类型
    #[arg(long, default_value = "Living Room")]
    pub room_type: String,
    /// 额外的自由文本要求
    #[arg(long, default_value_t = String::new())]
    pub additional_instructions: String,
    /// 先清空房间再布置家具
    #[arg(long)]
    pub empty_then_generate: bool,
    /// 输出文件路径
    #[arg(short, long, default_value = "redesign.png")]
    pub output: PathBuf,
    /// 两步模式下保存清空后房间的路径
    #[arg(long, value_name = "PATH")]
    pub save_empty: Option<PathBuf>,
}

impl SubCommandExtend for RedesignCommand {
    async fn run(&self, _opts: &Opts) -> anyhow::Result<()> {
        let original = fs::read(&self.image)?;
        let generator = GeminiClient::new(&self.gemini)?;
        let mode = if self.empty_then_generate {
            RedesignMode::EmptyThenGenerate
        } else {
            RedesignMode::SingleStep
        };

        let result = redesign::redesign(
            &generator,
            &original,
            &self.style,
            &self.room_type,
            &self.additional_instructions,
            mode,
        )
        .await?;

        if let Some(path) = &self.save_empty {
            fs::write(path, &result.before)?;
            info!("清空后的房间已保存到 {}", path.display());
        }
        fs::write(&self.output, &result.after)?;
        info!("设计图已保存到 {}", self.output.display());
        Ok(())
    }
}
