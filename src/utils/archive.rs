//! Statement text decoding and zip archive expansion
//!
//! A statement may arrive split across several XML parts inside one zip
//! archive. The parts are decompressed concurrently but always joined in
//! archive enumeration order, whatever order they finish in.

use futures::stream::{FuturesUnordered, TryStreamExt};
use log::debug;
use std::future::Future;
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::types::*;

/// Decode statement bytes to text
///
/// A byte order mark selects the encoding; otherwise UTF-8 is tried first and
/// Windows-1252 (the usual "ANSI" bank export) is the fallback.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some((encoding, bom_length)) = encoding_rs::Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_length..]);
        return text.into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
    }
}

/// Expand a zip archive and join the text of all its files in archive order
pub async fn expand_archive(bytes: Vec<u8>) -> ReconcileResult<String> {
    let bytes: Arc<[u8]> = bytes.into();
    let entry_count = zip::ZipArchive::new(Cursor::new(bytes.clone()))
        .map_err(|e| ReconcileError::ReadFailure(format!("Unzip error: {e}")))?
        .len();
    debug!("Expanding archive with {entry_count} entries");

    let parts = (0..entry_count).map(|index| {
        let bytes = bytes.clone();
        async move {
            let text = tokio::task::spawn_blocking(move || read_entry(bytes, index))
                .await
                .map_err(|e| ReconcileError::ReadFailure(format!("Unzip error: {e}")))??;
            Ok::<_, ReconcileError>((index, text))
        }
    });
    concatenate_in_order(parts).await
}

/// Wait for every part, then join them by their enumeration index
///
/// Parts may complete in any order. The first failing part fails the whole
/// join.
pub async fn concatenate_in_order<I, F>(parts: I) -> ReconcileResult<String>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = ReconcileResult<(usize, String)>>,
{
    let mut completed: Vec<(usize, String)> = parts
        .into_iter()
        .collect::<FuturesUnordered<_>>()
        .try_collect()
        .await?;
    completed.sort_by_key(|(index, _)| *index);
    Ok(completed.into_iter().map(|(_, text)| text).collect())
}

fn read_entry(bytes: Arc<[u8]>, index: usize) -> ReconcileResult<String> {
    let unzip_error =
        |e: zip::result::ZipError| ReconcileError::ReadFailure(format!("Unzip error: {e}"));

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(unzip_error)?;
    let mut entry = archive.by_index(index).map_err(unzip_error)?;
    if entry.is_dir() {
        return Ok(String::new());
    }

    let mut raw = Vec::new();
    entry
        .read_to_end(&mut raw)
        .map_err(|e| ReconcileError::ReadFailure(format!("{}: {e}", entry.name())))?;
    debug!("Unzipped {} ({} bytes)", entry.name(), raw.len());
    Ok(decode_text(&raw))
}
