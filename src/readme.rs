//! README.md rendering for a scheme directory.
use std::path::Path;

use log::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::schema::{SchemeInfo, DEFAULT_LICENSE};

pub const README_FILE: &str = "README.md";

const LABS_URL: &str = "https://labs.primalscheme.com/detail";

const CC_BY_SA_4_0_FOOTER: &str = "\n\n------------------------------------------------------------------------\n\n\
This work is licensed under a [Creative Commons Attribution-ShareAlike 4.0 International License](http://creativecommons.org/licenses/by-sa/4.0/)\n\n\
![](https://i.creativecommons.org/l/by-sa/4.0/88x31.png)\n";

/// Render the README for `info`, linking each overview image under `work/`.
pub fn render(info: &SchemeInfo, images: &[String]) -> serde_json::Result<String> {
    let json = info.to_json_string()?;
    let mut out = format!(
        "# {} {}bp {}\n\n[primalscheme labs]({LABS_URL}/{}/{}/{})\n\n",
        info.schemename, info.ampliconsize, info.schemeversion, info.schemename, info.ampliconsize, info.schemeversion
    );
    if let Some(description) = &info.description {
        out.push_str(&format!("## Description\n\n{description}\n\n"));
    }
    out.push_str("## Overviews\n\n");
    for image in images {
        out.push_str(&format!("![{image}](work/{image})\n\n"));
    }
    out.push_str(&format!("## Details\n\n```json\n{}\n```\n", json.trim_end()));
    if info.license.as_deref() == Some(DEFAULT_LICENSE) {
        out.push_str(CC_BY_SA_4_0_FOOTER);
    }
    Ok(out)
}

/// Overview images (`*.png`) anywhere under `dir`, by file name, sorted.
pub fn overview_images(dir: &Path) -> Vec<String> {
    let mut images: Vec<String> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|x| x == "png"))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    images.sort();
    images
}

/// Regenerate `dir/README.md` from `info`.
pub fn write(dir: &Path, info: &SchemeInfo) -> Result<()> {
    let path = dir.join(README_FILE);
    let text = render(info, &overview_images(dir)).map_err(|e| Error::json(&path, e))?;
    std::fs::write(&path, text)?;
    debug!("regenerated README.md for {}", info.identity());
    Ok(())
}
