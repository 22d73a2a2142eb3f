use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};

use crate::cli::SubCommandExtend;
use crate::clip::ClipClient;
use crate::config::{ClipOptions, Opts, QdrantOptions, SearchOptions};
use crate::imgutil;
use crate::searcher::{FurnitureSearcher, SearchResult};

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub clip: ClipOptions,
    #[command(flatten)]
    pub qdrant: QdrantOptions,
    #[command(flatten)]
    pub search: SearchOptions,
    /// 被搜索的图片路径
    pub image: PathBuf,
    /// 裁剪区域，格式为 X,Y,WIDTH,HEIGHT，不填则搜索整张图片
    #[arg(long, value_name = "BOX", value_parser = parse_crop_box)]
    pub crop: Option<(f32, f32, f32, f32)>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, _opts: &Opts) -> anyhow::Result<()> {
        let bytes = std::fs::read(&self.image)?;
        let mut img = image::load_from_memory(&bytes)?;
        if let Some((x, y, w, h)) = self.crop {
            if w <= 0.0 || h <= 0.0 {
                bail!("裁剪区域的宽高必须为正数");
            }
            img = imgutil::crop_image(&img, x, y, w, h);
        }
        let query = imgutil::letterbox(&img, imgutil::QUERY_SIZE);

        let clip = ClipClient::new(&self.clip);
        let searcher = FurnitureSearcher::connect(clip, &self.qdrant).await;
        let result = searcher.search(&query, self.search.count).await?;
        print_result(&result, self)
    }
}

fn parse_crop_box(s: &str) -> Result<(f32, f32, f32, f32), String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 4 {
        return Err(format!("无效的裁剪区域: {s}"));
    }
    let mut values = [0f32; 4];
    for (value, part) in values.iter_mut().zip(&parts) {
        *value = part.trim().parse().map_err(|_| format!("无效的裁剪区域: {s}"))?;
    }
    Ok((values[0], values[1], values[2], values[3]))
}

fn print_result(result: &[SearchResult], opts: &SearchCommand) -> Result<()> {
    match opts.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for item in result {
                println!("{:.3}\t{}\t{}\t{}", item.score, item.title, item.price, item.image_url);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crop_box() {
        assert_eq!(parse_crop_box("10,20,100,50").unwrap(), (10.0, 20.0, 100.0, 50.0));
        assert_eq!(parse_crop_box(" 1 , 2 , 3 , 4 ").unwrap(), (1.0, 2.0, 3.0, 4.0));
        assert!(parse_crop_box("10,20,100").is_err());
        assert!(parse_crop_box("a,b,c,d").is_err());
    }
}
