/// ジョブ単位の一時ファイル
///
/// Lambdaの/tmpはウォームスタート間で共有されるため、ジョブ終了時に必ず削除する。
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::domain::{MasteringJob, SongId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchFiles {
    reference: PathBuf,
    instrumental: PathBuf,
    vocals: PathBuf,
    output: PathBuf,
}

impl ScratchFiles {
    /// 作業ディレクトリ配下にジョブ用のパスを割り当てる
    ///
    /// 文字列の楽曲IDはそのままファイル名に使わず、`file_stem`で置換した値を使う。
    pub fn for_job(work_dir: &Path, job: &MasteringJob) -> Self {
        let stem = file_stem(job.song_id());
        Self {
            reference: work_dir.join("reference.wav"),
            instrumental: work_dir.join("instrumental.wav"),
            vocals: work_dir.join(format!("vocals_{}.wav", stem)),
            output: work_dir.join(format!("final_song_{}.wav", stem)),
        }
    }

    pub fn reference(&self) -> &Path {
        &self.reference
    }

    pub fn instrumental(&self) -> &Path {
        &self.instrumental
    }

    pub fn vocals(&self) -> &Path {
        &self.vocals
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// 存在する一時ファイルをすべて削除する
    ///
    /// 削除に失敗しても警告を出して続行する。戻り値は削除できたファイル数。
    pub async fn cleanup(&self) -> usize {
        let mut removed = 0;
        for path in [&self.vocals, &self.output, &self.reference, &self.instrumental] {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                continue;
            }
            match tokio::fs::remove_file(path).await {
                Ok(()) => {
                    info!(path = %path.display(), "一時ファイルを削除");
                    removed += 1;
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "一時ファイルの削除に失敗");
                }
            }
        }
        removed
    }
}

/// 楽曲IDをファイル名に使える形にする
///
/// `[A-Za-z0-9_-]`以外の文字は`_`に置き換える。
fn file_stem(song_id: &SongId) -> String {
    song_id
        .to_string()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
