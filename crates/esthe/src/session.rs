//! ログインセッションをファイルに永続化するストア。

use std::{
    fs,
    io::{self, Write as _},
    path::{Path, PathBuf},
};

use anyhow::{Context as _, Result};
use tracing::warn;

use crate::datastore::Session;

pub struct SessionStore {
    /// 永続化ファイルのパス
    path: PathBuf,
    session: Option<Session>,
}

impl SessionStore {
    /// ストアを読み込む。ファイルが存在しない場合はセッションなしとして扱う。
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let session = if path.exists() {
            let content = fs::read_to_string(&path).context("Failed to read session file")?;
            Some(serde_json::from_str(&content).context("Failed to parse session file")?)
        } else {
            None
        };
        Ok(Self { path, session })
    }

    /// [`load`](Self::load) と同じだが、読めないファイルはセッションなしとして扱う。
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::load(path).unwrap_or_else(|e| {
            warn!(path = ?path, error = %format!("{e:#}"), "Ignoring unreadable session file");
            Self {
                path: path.to_path_buf(),
                session: None,
            }
        })
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// セッションを保存する。
    pub fn set(&mut self, session: Session) -> Result<()> {
        let content =
            serde_json::to_string_pretty(&session).context("Failed to serialize session")?;
        write_private(&self.path, content.as_bytes()).context("Failed to write session file")?;
        self.session = Some(session);
        Ok(())
    }

    /// セッションを破棄し、ファイルも削除する。
    pub fn clear(&mut self) -> Result<()> {
        self.session = None;
        if self.path.exists() {
            fs::remove_file(&self.path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// トークンを含むので所有者だけが読み書きできるファイルとして書く。
fn write_private(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt as _;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // 既存ファイルは作成時のモードが適用されない
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(content)
}
