use std::collections::BTreeMap;
use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};

const PLAYLISTS_HEADING: &str = "## Playlists";
const PLAYLIST_URL_PREFIX: &str = "https://open.spotify.com/playlist/";

/// Escapes characters that would change how a name renders inside link text.
fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '>') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Rewrites the `## Playlists` section of `readme` as a link list of
/// `published` (name to remote id), in name order. Text before the heading and
/// any later `## ` section are kept. Without a heading the section is appended.
pub fn render_playlist_index(readme: &str, published: &BTreeMap<String, String>) -> String {
    let index: String = published
        .iter()
        .map(|(name, id)| {
            format!(
                "- [{}]({}{})\n",
                escape_markdown(name),
                PLAYLIST_URL_PREFIX,
                id
            )
        })
        .collect();

    let mut lines = readme.split_inclusive('\n');
    let mut rendered = String::new();
    let mut found = false;
    for line in lines.by_ref() {
        if line.trim_end() == PLAYLISTS_HEADING {
            found = true;
            break;
        }
        rendered.push_str(line);
    }

    if !found {
        rendered = readme.trim_end().to_string();
        if !rendered.is_empty() {
            rendered.push_str("\n\n");
        }
    }
    let rest: String = lines.skip_while(|line| !line.starts_with("## ")).collect();

    rendered.push_str(PLAYLISTS_HEADING);
    rendered.push_str("\n\n");
    rendered.push_str(&index);
    if !rest.is_empty() {
        rendered.push('\n');
        rendered.push_str(&rest);
    }
    rendered
}

/// Regenerates the playlist index of the README at `path`, creating the file if needed.
pub async fn update_readme(path: &Path, published: &BTreeMap<String, String>) -> Result<()> {
    let readme = if tokio::fs::try_exists(path)
        .await
        .wrap_err_with(|| format!("Failed to check for README at {}", path.display()))?
    {
        tokio::fs::read_to_string(path)
            .await
            .wrap_err_with(|| format!("Failed to read README from {}", path.display()))?
    } else {
        String::new()
    };

    tokio::fs::write(path, render_playlist_index(&readme, published))
        .await
        .wrap_err_with(|| format!("Failed to write README to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn published(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(name, id)| (name.to_string(), id.to_string()))
            .collect()
    }

    #[test]
    fn test_index_replaces_playlists_section() {
        let readme = "Arbitrary text\n\n## Playlists\n\n- [Stale](https://open.spotify.com/playlist/old)\n";

        let rendered = render_playlist_index(
            readme,
            &published(&[
                ("scraped_3_name", "published_5_id"),
                ("published_1_name", "published_1_id"),
                ("scraped_2_name", "published_4_id"),
            ]),
        );

        assert_eq!(
            rendered,
            "Arbitrary text\n\
             \n\
             ## Playlists\n\
             \n\
             - [published\\_1\\_name](https://open.spotify.com/playlist/published_1_id)\n\
             - [scraped\\_2\\_name](https://open.spotify.com/playlist/published_4_id)\n\
             - [scraped\\_3\\_name](https://open.spotify.com/playlist/published_5_id)\n"
        );
    }

    #[test]
    fn test_index_keeps_following_sections() {
        let readme = "# Archive\n## Playlists\nold entry\n## License\nMIT\n";

        let rendered = render_playlist_index(readme, &published(&[("A", "a_id")]));

        assert_eq!(
            rendered,
            "# Archive\n## Playlists\n\n- [A](https://open.spotify.com/playlist/a_id)\n\n## License\nMIT\n"
        );
    }

    #[test]
    fn test_index_is_appended_without_heading() {
        assert_eq!(
            render_playlist_index("# Archive\n", &published(&[("A", "a_id")])),
            "# Archive\n\n## Playlists\n\n- [A](https://open.spotify.com/playlist/a_id)\n"
        );
        assert_eq!(
            render_playlist_index("", &published(&[])),
            "## Playlists\n\n"
        );
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(
            escape_markdown("[Lo-Fi] *Beats* (Cumulative)"),
            "\\[Lo-Fi\\] \\*Beats\\* (Cumulative)"
        );
    }

    #[tokio::test]
    async fn test_update_readme_creates_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("README.md");

        update_readme(&path, &published(&[("A", "a_id")]))
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "## Playlists\n\n- [A](https://open.spotify.com/playlist/a_id)\n"
        );
    }
}
