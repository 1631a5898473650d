pub use url::Url;

/// 判断 `domain` 是否等于 `domain_to_match_against` 或是其子域名
pub fn domain_is_within_domain(domain: &str, domain_to_match_against: &str) -> bool {
    if domain_to_match_against.is_empty() {
        return false;
    }

    if domain_to_match_against == "." {
        return true;
    }

    let domain_partials: Vec<&str> = domain.trim_end_matches('.').rsplit('.').collect();
    let domain_to_match_against_partials: Vec<&str> = domain_to_match_against
        .trim_start_matches('.')
        .trim_end_matches('.')
        .rsplit('.')
        .collect();

    if domain_to_match_against_partials.len() > domain_partials.len() {
        return false;
    }

    domain_to_match_against_partials
        .iter()
        .zip(domain_partials.iter())
        .all(|(expected, actual)| expected.eq_ignore_ascii_case(actual))
}

/// 提取 URL 的主机名；相对地址或无效地址返回 `None`
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|host| host.to_lowercase()))
}

/// 以页面地址为基准解析资源地址
pub fn resolve_url(from: &Url, to: &str) -> Option<Url> {
    from.join(to.trim()).ok()
}

/// 截断为至多 `max_chars` 个字符，超出时追加省略号
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_is_within_domain() {
        assert!(domain_is_within_domain("upload.wikimedia.org", "wikimedia.org"));
        assert!(domain_is_within_domain("wikimedia.org", "wikimedia.org"));
        assert!(domain_is_within_domain("en.wikipedia.org", ".wikipedia.org"));
        assert!(!domain_is_within_domain("notwikimedia.org", "wikimedia.org"));
        assert!(!domain_is_within_domain("org", "wikimedia.org"));
        assert!(!domain_is_within_domain("example.com", ""));
    }

    #[test]
    fn test_host_of() {
        assert_eq!(
            host_of("https://Upload.Wikimedia.org/a.png").as_deref(),
            Some("upload.wikimedia.org")
        );
        assert_eq!(host_of("/relative/path.png"), None);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("你好世界再见", 4), "你好世界…");
    }
}
