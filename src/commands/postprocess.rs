//! Archive recompression command

use crate::core::context::BuildContext;
use crate::core::error::RailResult;
use crate::pipeline::Recompressor;
use std::path::{Path, PathBuf};

/// Recompress one archive
pub fn run_postprocess(ctx: &BuildContext, archive: PathBuf) -> RailResult<()> {
  let archive = ctx.resolve_path(&archive);
  println!("🗜️  Post-processing {}", archive.display());
  postprocess_archives(ctx, [archive.as_path()])
}

/// Recompress finished archives, printing one line each
pub(crate) fn postprocess_archives<'a>(
  ctx: &BuildContext,
  archives: impl IntoIterator<Item = &'a Path>,
) -> RailResult<()> {
  let recompressor = Recompressor::from_context(ctx);
  for archive in archives {
    let outcome = recompressor.process(archive)?;
    println!("   {}", recompressor.describe(archive, &outcome));
  }
  Ok(())
}
