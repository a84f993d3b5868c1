//! Summary image: top countries by estimated GDP plus the latest run, rendered as SVG.

use crate::error::ArtifactError;
use crate::model::{Country, RefreshRun};
use crate::store::CountryRepository;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const TOP_N: u32 = 5;
const WIDTH: u32 = 640;
const ROW_HEIGHT: u32 = 36;

pub struct SummaryArtifactGenerator {
    store: Arc<dyn CountryRepository>,
    path: PathBuf,
}

impl SummaryArtifactGenerator {
    pub fn new(store: Arc<dyn CountryRepository>, path: impl Into<PathBuf>) -> Self {
        SummaryArtifactGenerator {
            store,
            path: path.into(),
        }
    }

    /// Best effort: every failure is logged and swallowed.
    pub async fn regenerate(&self) {
        match self.try_regenerate().await {
            Ok(()) => tracing::info!(path = %self.path.display(), "summary image regenerated"),
            Err(e) => tracing::error!(error = %e, path = %self.path.display(), "summary image regeneration failed"),
        }
    }

    pub async fn try_regenerate(&self) -> Result<(), ArtifactError> {
        let top = self
            .store
            .top_by_estimate(TOP_N)
            .await
            .map_err(|e| ArtifactError::Store(e.to_string()))?;
        let run = self
            .store
            .latest_run()
            .await
            .map_err(|e| ArtifactError::Store(e.to_string()))?
            .ok_or(ArtifactError::NoRun)?;
        let total = self.store.count().await.map_err(|e| ArtifactError::Store(e.to_string()))?;
        let svg = render_svg(&top, &run, total);
        write_atomic(&self.path, svg.as_bytes()).await?;
        Ok(())
    }

    /// Current artifact bytes, or `None` if never generated.
    pub async fn read(&self) -> Result<Option<Vec<u8>>, ArtifactError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

pub fn render_svg(top: &[Country], run: &RefreshRun, total_countries: i64) -> String {
    let rows = top.len().max(1) as u32;
    let height = 170 + rows * ROW_HEIGHT;
    let mut out = String::new();
    out.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n",
        w = WIDTH,
        h = height
    ));
    out.push_str(&format!("<rect width=\"{}\" height=\"{}\" fill=\"#f7f7f2\"/>\n", WIDTH, height));
    out.push_str("<g font-family=\"Helvetica, Arial, sans-serif\" fill=\"#1d1d1b\">\n");
    out.push_str("<text x=\"24\" y=\"44\" font-size=\"24\" font-weight=\"bold\">Country Summary</text>\n");
    out.push_str(&format!(
        "<text x=\"24\" y=\"76\" font-size=\"16\">Total countries: {} (last run processed {})</text>\n",
        total_countries, run.processed_count
    ));
    out.push_str(&format!(
        "<text x=\"24\" y=\"108\" font-size=\"16\" font-weight=\"bold\">Top {} by estimated GDP</text>\n",
        TOP_N
    ));
    if top.is_empty() {
        out.push_str("<text x=\"24\" y=\"140\" font-size=\"15\">No estimates available</text>\n");
    }
    for (i, c) in top.iter().enumerate() {
        let y = 140 + i as u32 * ROW_HEIGHT;
        let gdp = c.estimated_gdp.map(format_whole).unwrap_or_else(|| "N/A".into());
        out.push_str(&format!(
            "<text x=\"24\" y=\"{}\" font-size=\"15\">{}. {}</text>\n",
            y,
            i + 1,
            escape_xml(&c.name)
        ));
        out.push_str(&format!(
            "<text x=\"{}\" y=\"{}\" font-size=\"15\" text-anchor=\"end\">{}</text>\n",
            WIDTH - 24,
            y,
            gdp
        ));
    }
    out.push_str(&format!(
        "<text x=\"24\" y=\"{}\" font-size=\"13\" fill=\"#6b6b66\">Last refreshed: {}</text>\n",
        height - 20,
        run.created_at.to_rfc3339()
    ));
    out.push_str("</g>\n</svg>\n");
    out
}

/// Round to whole units with thousands separators: 1234567.8 -> "1,234,568".
pub fn format_whole(v: f64) -> String {
    let rounded = v.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
