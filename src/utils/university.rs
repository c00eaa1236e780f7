//! Maps a student email address to its university domain and display badge.

/// Known institutions and how they are shown next to a user's name.
const KNOWN_BADGES: &[(&str, &str)] = &[
    ("iitd.ac.in", "IIT Delhi"),
    ("iitb.ac.in", "IIT Bombay"),
    ("iisc.ac.in", "IISc Bangalore"),
    ("du.ac.in", "Delhi University"),
    ("jnu.ac.in", "JNU"),
    ("bhu.ac.in", "BHU"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniversityInfo {
    pub domain: String,
    pub badge: String,
}

/// Returns `None` when the address is malformed or its host does not fall under
/// any allow-listed suffix.
///
/// Matching is label-aware: `edu` matches `mit.edu` and `cs.mit.edu`, never
/// `myedu`. A generic academic suffix (`edu`, `ac.in`, `edu.in`, ...) yields the
/// registrable domain, i.e. the suffix plus the label directly in front of it.
/// Any other allow-list entry names an institution and is returned as-is.
/// The most specific matching entry wins.
pub fn extract_university_info(email: &str, allowed: &[String]) -> Option<UniversityInfo> {
    let (local, host) = email.trim().rsplit_once('@')?;
    if local.is_empty() {
        return None;
    }
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() || host.split('.').any(|label| label.is_empty() || label.len() > 63) {
        return None;
    }

    let suffix = allowed
        .iter()
        .filter(|suffix| host_matches(&host, suffix))
        .max_by_key(|suffix| suffix.split('.').count())?;

    let domain = if is_generic_suffix(suffix) {
        let prefix = host.strip_suffix(suffix.as_str())?.strip_suffix('.')?;
        let institution = prefix.rsplit('.').next()?;
        format!("{institution}.{suffix}")
    } else {
        suffix.clone()
    };

    let badge = match badge_for(&domain) {
        Some(badge) => badge.to_string(),
        None => domain
            .split('.')
            .next()
            .unwrap_or(&domain)
            .to_ascii_uppercase(),
    };

    Some(UniversityInfo { domain, badge })
}

fn host_matches(host: &str, suffix: &str) -> bool {
    host == suffix
        || host
            .strip_suffix(suffix)
            .is_some_and(|rest| rest.ends_with('.'))
}

fn is_generic_suffix(suffix: &str) -> bool {
    match suffix.split_once('.') {
        None => true,
        Some((first, _)) => matches!(first, "ac" | "edu" | "ernet"),
    }
}

fn badge_for(domain: &str) -> Option<&'static str> {
    KNOWN_BADGES
        .iter()
        .find(|(known, _)| *known == domain)
        .map(|(_, badge)| *badge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_UNIVERSITY_DOMAINS;

    fn allowed() -> Vec<String> {
        DEFAULT_UNIVERSITY_DOMAINS.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn named_institution_keeps_its_domain_and_badge() {
        let info = extract_university_info("asha@iitd.ac.in", &allowed()).unwrap();
        assert_eq!(info.domain, "iitd.ac.in");
        assert_eq!(info.badge, "IIT Delhi");
    }

    #[test]
    fn department_subdomain_collapses_to_institution() {
        let info = extract_university_info("ravi@cse.iitb.ac.in", &allowed()).unwrap();
        assert_eq!(info.domain, "iitb.ac.in");
        assert_eq!(info.badge, "IIT Bombay");

        let info = extract_university_info("kim@cs.mit.edu", &allowed()).unwrap();
        assert_eq!(info.domain, "mit.edu");
        assert_eq!(info.badge, "MIT");
    }

    #[test]
    fn generic_suffix_yields_registrable_domain() {
        let info = extract_university_info("x@nitk.ac.in", &allowed()).unwrap();
        assert_eq!(info.domain, "nitk.ac.in");
        assert_eq!(info.badge, "NITK");
    }

    #[test]
    fn configured_institution_without_badge_is_kept_whole() {
        let allowed = vec!["edu".to_string(), "stateu.org".to_string()];
        let info = extract_university_info("lee@physics.stateu.org", &allowed).unwrap();
        assert_eq!(info.domain, "stateu.org");
        assert_eq!(info.badge, "STATEU");
    }

    #[test]
    fn domain_is_case_insensitive() {
        let info = extract_university_info("Asha@IITD.AC.IN", &allowed()).unwrap();
        assert_eq!(info.domain, "iitd.ac.in");
    }

    #[test]
    fn non_university_addresses_are_rejected() {
        for email in [
            "someone@gmail.com",
            "someone@myedu",
            "someone@edu",
            "someone@ac.in",
            "no-at-sign.edu",
            "@iitd.ac.in",
            "someone@",
            "someone@foo..edu",
            format!("someone@{}.edu", "x".repeat(64)).as_str(),
        ] {
            assert!(
                extract_university_info(email, &allowed()).is_none(),
                "{email} should be rejected"
            );
        }
    }

    #[test]
    fn extraction_is_deterministic() {
        let a = extract_university_info("kim@cs.mit.edu", &allowed());
        let b = extract_university_info("kim@cs.mit.edu", &allowed());
        assert_eq!(a, b);
    }
}
