//! WordPress-specific provisioning pieces: MySQL identifier derivation,
//! archive download/extraction, and wp-config rendering.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::crypto::generate_password;

pub const WORDPRESS_ARCHIVE_URL: &str = "https://wordpress.org/latest.tar.gz";

/// MySQL username column caps at 16 characters on older servers.
const MYSQL_USER_MAX: usize = 16;

/// Derive (db_name, db_user) from a domain: `wp_example_com`. Only
/// `[a-z0-9_]` survives so the values are safe inside unquoted SQL
/// identifiers.
pub fn db_identifiers(domain: &str) -> (String, String) {
    let safe: String = domain
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let db_name = format!("wp_{}", safe);
    let db_user = db_name.chars().take(MYSQL_USER_MAX).collect();
    (db_name, db_user)
}

const SALT_KEYS: [&str; 8] = [
    "AUTH_KEY",
    "SECURE_AUTH_KEY",
    "LOGGED_IN_KEY",
    "NONCE_KEY",
    "AUTH_SALT",
    "SECURE_AUTH_SALT",
    "LOGGED_IN_SALT",
    "NONCE_SALT",
];

pub fn render_wp_config(domain: &str, db_name: &str, db_user: &str, db_password: &str) -> String {
    let mut defines = String::new();
    for key in SALT_KEYS {
        // Column-align like the stock wp-config sample.
        defines.push_str(&format!(
            "define('{}',{}'{}');\n",
            key,
            " ".repeat(18 - key.len()),
            generate_password(64)
        ));
    }

    format!(
        r#"<?php
/**
 * SkyDock Panel - WordPress Configuration
 * Generated for {domain}
 */

define('DB_NAME', '{db_name}');
define('DB_USER', '{db_user}');
define('DB_PASSWORD', '{db_password}');
define('DB_HOST', 'localhost');
define('DB_CHARSET', 'utf8mb4');
define('DB_COLLATE', '');

{defines}
$table_prefix = 'wp_';

define('WP_DEBUG', false);

if ( !defined('ABSPATH') )
    define('ABSPATH', dirname(__FILE__) . '/');

require_once ABSPATH . 'wp-settings.php';
"#,
        domain = domain,
        db_name = db_name,
        db_user = db_user,
        db_password = db_password,
        defines = defines,
    )
}

/// Download the latest WordPress tarball into a temp file and unpack it into
/// `dest`, stripping the leading `wordpress/` path component.
pub async fn download_and_extract(dest: &Path) -> Result<()> {
    let response = reqwest::get(WORDPRESS_ARCHIVE_URL)
        .await
        .context("Failed to download WordPress")?
        .error_for_status()
        .context("WordPress download returned an error status")?;
    let bytes = response
        .bytes()
        .await
        .context("Failed to read WordPress archive body")?;

    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut staging = tempfile::NamedTempFile::new().context("Failed to create temp file")?;
        staging
            .write_all(&bytes)
            .context("Failed to write WordPress archive")?;
        extract_tar_gz(staging.path(), &dest)
    })
    .await
    .context("Extraction task panicked")??;

    Ok(())
}

fn extract_tar_gz(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = std::fs::File::open(archive_path).context("Failed to open archive")?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);

    for entry in archive.entries().context("Failed to read archive entries")? {
        let mut entry = entry.context("Corrupt archive entry")?;
        let path = entry.path().context("Archive entry has invalid path")?.into_owned();
        // Equivalent of tar --strip-components=1.
        let stripped: PathBuf = path.components().skip(1).collect();
        if stripped.as_os_str().is_empty() {
            continue;
        }
        entry
            .unpack(dest.join(&stripped))
            .with_context(|| format!("Failed to unpack {}", stripped.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_identifiers_sanitize_domain() {
        let (name, user) = db_identifiers("my-blog.example.com");
        assert_eq!(name, "wp_my_blog_example_com");
        assert_eq!(user, "wp_my_blog_examp");
        assert_eq!(user.len(), 16);
    }

    #[test]
    fn db_identifiers_short_domain_keeps_full_user() {
        let (name, user) = db_identifiers("ab.io");
        assert_eq!(name, "wp_ab_io");
        assert_eq!(user, "wp_ab_io");
    }

    #[test]
    fn wp_config_carries_credentials_and_salts() {
        let body = render_wp_config("example.com", "wp_example_com", "wp_example_com", "s3cret");
        assert!(body.contains("define('DB_NAME', 'wp_example_com');"));
        assert!(body.contains("define('DB_PASSWORD', 's3cret');"));
        assert!(body.contains("define('DB_HOST', 'localhost');"));
        for key in SALT_KEYS {
            assert!(body.contains(&format!("define('{}',", key)), "missing salt {}", key);
        }
        assert!(body.contains("require_once ABSPATH . 'wp-settings.php';"));
    }

    #[test]
    fn extraction_strips_leading_component() {
        // Build a tiny wordpress-shaped tar.gz in memory.
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("wp.tar.gz");
        {
            let file = std::fs::File::create(&archive_path).unwrap();
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(encoder);
            let mut header = tar::Header::new_gnu();
            let content = b"<?php // stub";
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "wordpress/index.php", content.as_slice())
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let dest = dir.path().join("site");
        std::fs::create_dir_all(&dest).unwrap();
        extract_tar_gz(&archive_path, &dest).unwrap();

        assert!(dest.join("index.php").exists());
        assert!(!dest.join("wordpress").exists());
    }
}
