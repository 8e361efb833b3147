use reqwest::Client;

use crate::constants::github::CHANGELOG_URL;
use crate::error::Result;

/// Downloads the raw `CHANGELOG.md`.
///
/// # Errors
///
/// Returns [`BarikError::Network`](crate::error::BarikError::Network) on
/// transport errors and non-success statuses.
pub async fn fetch_changelog(client: &Client) -> Result<String> {
    let text = client.get(CHANGELOG_URL).send().await?.error_for_status()?.text().await?;
    Ok(text)
}

/// Lines under the first header mentioning `## <version>`, up to the next
/// `## ` header. A bare `<br>` line becomes an empty `### ` heading.
///
/// Returns an empty string when the version has no section.
#[must_use]
pub fn extract_section(version: &str, changelog: &str) -> String {
    let needle = format!("## {version}");
    let lines: Vec<&str> = changelog.lines().collect();
    let Some(start) = lines.iter().position(|line| line.contains(&needle)) else {
        return String::new();
    };

    let mut section = Vec::new();
    for (offset, line) in lines[start..].iter().enumerate() {
        if line.starts_with("## ") {
            if offset == 0 {
                continue;
            }
            break;
        }
        section.push(if *line == "<br>" { "### " } else { *line });
    }

    section.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANGELOG: &str = "# Changelog\n\n## 0.5.1\n\n- Fix calendar\n<br>\n- Faster spaces\n\n## 0.5.0\n\n- First\n";

    #[test]
    fn extracts_one_version() {
        assert_eq!(extract_section("0.5.1", CHANGELOG), "\n- Fix calendar\n### \n- Faster spaces\n");
        assert_eq!(extract_section("0.5.0", CHANGELOG), "\n- First");
    }

    #[test]
    fn missing_version_is_empty() {
        assert_eq!(extract_section("9.9.9", CHANGELOG), "");
    }
}
