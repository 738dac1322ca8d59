//! Virtual-host rendering. Pure string builders so the bodies can be
//! asserted on without touching the filesystem.

/// php-fpm socket path for a version string: "8.1" -> php81-fpm.sock.
pub fn php_fpm_socket(php_version: &str) -> String {
    format!("/var/run/php/php{}-fpm.sock", php_version.replace('.', ""))
}

pub fn nginx_vhost(domain: &str, root: &str, php_version: &str) -> String {
    format!(
        r#"server {{
    listen 80;
    server_name {domain} www.{domain};
    root {root};
    index index.php index.html index.htm;

    access_log /var/log/nginx/{domain}-access.log;
    error_log /var/log/nginx/{domain}-error.log;

    location / {{
        try_files $uri $uri/ /index.php?$args;
    }}

    location ~ \.php$ {{
        fastcgi_pass unix:{socket};
        fastcgi_index index.php;
        fastcgi_param SCRIPT_FILENAME $document_root$fastcgi_script_name;
        include fastcgi_params;
    }}

    location ~ /\.ht {{
        deny all;
    }}
}}
"#,
        domain = domain,
        root = root,
        socket = php_fpm_socket(php_version),
    )
}

pub fn apache_vhost(domain: &str, root: &str) -> String {
    format!(
        r#"<VirtualHost *:80>
    ServerName {domain}
    ServerAlias www.{domain}
    DocumentRoot {root}

    <Directory {root}>
        Options Indexes FollowSymLinks
        AllowOverride All
        Require all granted
    </Directory>

    ErrorLog ${{APACHE_LOG_DIR}}/{domain}-error.log
    CustomLog ${{APACHE_LOG_DIR}}/{domain}-access.log combined
</VirtualHost>
"#,
        domain = domain,
        root = root,
    )
}

pub fn starter_index(domain: &str) -> String {
    format!(
        r#"<?php
// SkyDock Panel - {domain}
echo "<h1>Welcome to {domain}</h1>";
echo "<p>This is a PHP application managed by SkyDock Panel.</p>";
phpinfo();
"#,
        domain = domain,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fpm_socket_strips_version_dots() {
        assert_eq!(php_fpm_socket("8.1"), "/var/run/php/php81-fpm.sock");
        assert_eq!(php_fpm_socket("7.4"), "/var/run/php/php74-fpm.sock");
    }

    #[test]
    fn nginx_vhost_references_domain_and_root() {
        let body = nginx_vhost("example.com", "/var/www/skydock/alice/example.com", "8.2");
        assert!(body.contains("server_name example.com www.example.com;"));
        assert!(body.contains("root /var/www/skydock/alice/example.com;"));
        assert!(body.contains("fastcgi_pass unix:/var/run/php/php82-fpm.sock;"));
        assert!(body.contains("try_files $uri $uri/ /index.php?$args;"));
    }

    #[test]
    fn apache_vhost_references_domain_and_root() {
        let body = apache_vhost("example.com", "/var/www/skydock/alice/example.com");
        assert!(body.contains("ServerName example.com"));
        assert!(body.contains("DocumentRoot /var/www/skydock/alice/example.com"));
        assert!(body.contains("<Directory /var/www/skydock/alice/example.com>"));
        // Apache log dir variable must survive formatting.
        assert!(body.contains("${APACHE_LOG_DIR}/example.com-error.log"));
    }
}
