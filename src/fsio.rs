//! 파일 접근 협력자
//!
//! 서버: 데이터 루트 밖으로 나가지 못하게 요청 경로를 검증하고 읽는다.
//! 클라이언트: 부모 디렉터리를 만들며 결과를 기록한다.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// 요청 파일명을 데이터 루트 아래로 안전하게 해석
///
/// 절대 경로와 `..` 탈출은 InvalidPath, 루트 안이지만 일반 파일이
/// 아니면 FileNotFound.
pub fn resolve_under_root(root: &Path, requested: &str) -> Result<PathBuf> {
    let rel = Path::new(requested);

    if rel.is_absolute() {
        return Err(Error::InvalidPath {
            path: requested.to_owned(),
        });
    }

    let mut resolved = root.to_path_buf();
    for component in rel.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            // ParentDir, Prefix, RootDir 전부 탈출 시도
            _ => {
                return Err(Error::InvalidPath {
                    path: requested.to_owned(),
                })
            }
        }
    }

    if !resolved.is_file() {
        return Err(Error::FileNotFound {
            path: requested.to_owned(),
        });
    }

    Ok(resolved)
}

/// 파일 전체 읽기
pub async fn read_file(path: &Path) -> Result<Vec<u8>> {
    Ok(tokio::fs::read(path).await?)
}

/// 부모 디렉터리를 만들며 결과 기록
pub async fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, data).await?;
    Ok(())
}
