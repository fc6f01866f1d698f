//! Gated-content storage and the one-shot decode used at reveal time.
//!
//! Solution and remark material ships inside the page as an opaque,
//! reversibly encoded blob. The decode runs exactly once, at first reveal.
//! The encode side lives in the site generator and is out of scope here.

use anyhow::{Result, anyhow};
use async_trait::async_trait;

/// Decodes a stored gated-content blob into visible content.
#[async_trait(?Send)]
pub trait GatedContentStore {
    async fn decode(&self, blob: &str) -> Result<String>;
}

/// Store for blobs compressed with the generator's LZW scheme: each char of
/// the blob is one LZW code, dictionary seeded with the 256 byte chars.
#[derive(Debug, Clone, Copy, Default)]
pub struct LzwStore;

#[async_trait(?Send)]
impl GatedContentStore for LzwStore {
    async fn decode(&self, blob: &str) -> Result<String> {
        lzw_decompress(blob)
    }
}

/// Pass-through store for deployments that ship gated content unencoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainStore;

#[async_trait(?Send)]
impl GatedContentStore for PlainStore {
    async fn decode(&self, blob: &str) -> Result<String> {
        Ok(blob.to_string())
    }
}

fn lzw_decompress(blob: &str) -> Result<String> {
    let mut codes = blob.chars().map(|c| c as usize);
    let Some(first) = codes.next() else {
        return Ok(String::new());
    };

    let mut dict: Vec<String> = (0u8..=255).map(|b| char::from(b).to_string()).collect();
    let mut current = dict
        .get(first)
        .cloned()
        .ok_or_else(|| anyhow!("corrupt gated blob: first code {} out of range", first))?;
    let mut output = current.clone();

    for code in codes {
        let entry = if let Some(known) = dict.get(code) {
            known.clone()
        } else if code == dict.len() {
            // The cScSc case: the code being defined by this very step.
            let head = first_char(&current)?;
            format!("{current}{head}")
        } else {
            return Err(anyhow!("corrupt gated blob: code {} out of range", code));
        };

        output.push_str(&entry);
        let head = first_char(&entry)?;
        dict.push(format!("{current}{head}"));
        current = entry;
    }

    Ok(output)
}

fn first_char(s: &str) -> Result<char> {
    s.chars()
        .next()
        .ok_or_else(|| anyhow!("corrupt gated blob: empty dictionary entry"))
}
