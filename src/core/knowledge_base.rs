//! Static knowledge used by the vulnerability classifier.
//!
//! It holds the scripts known to enumerate CVEs and the table of product
//! signatures whose version prefixes are known to be vulnerable. The data is
//! read-only; callers that need a different table build a
//! [`VersionSignatureTable`] from their own entries.

/// Scripts whose output is a list of CVE identifiers (one finding per CVE).
static VULN_ENUMERATION_SCRIPTS: &[&str] = &["vulners"];

/// A product signature and the version prefixes flagged as vulnerable.
pub struct VersionSignature {
    /// Lowercase substring matched against the detected product name.
    pub product: &'static str,
    /// Version prefixes, checked in order. The first match wins.
    pub vulnerable_prefixes: &'static [&'static str],
}

/// The built-in signature table.
static VERSION_SIGNATURES: &[VersionSignature] = &[
    VersionSignature { product: "apache", vulnerable_prefixes: &["2.2.", "2.4.0", "2.4.1"] },
    VersionSignature {
        product: "openssh",
        vulnerable_prefixes: &["4.", "5.", "6.0", "6.1", "6.2", "6.3", "6.4", "6.5", "6.6"],
    },
    VersionSignature { product: "nginx", vulnerable_prefixes: &["1.3.", "1.4.0"] },
    VersionSignature { product: "vsftp", vulnerable_prefixes: &["2."] },
    VersionSignature { product: "proftpd", vulnerable_prefixes: &["1.3.3"] },
    VersionSignature { product: "mysql", vulnerable_prefixes: &["5.0", "5.1"] },
    VersionSignature { product: "tomcat", vulnerable_prefixes: &["6.", "7.0"] },
    VersionSignature {
        product: "wordpress",
        vulnerable_prefixes: &["3.", "4.0", "4.1", "4.2", "4.3", "4.4", "4.5", "4.6", "4.7"],
    },
];

/// Returns true for scripts that list CVE identifiers in their output.
pub fn is_vulnerability_enumeration_script(script_id: &str) -> bool {
    VULN_ENUMERATION_SCRIPTS.contains(&script_id)
}

/// A product key and the version prefix that matched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMatch {
    pub product: String,
    pub prefix: String,
}

#[derive(Debug, Clone)]
struct SignatureEntry {
    product: String,
    prefixes: Vec<String>,
}

/// Product → vulnerable version prefixes, consulted by the classifier.
#[derive(Debug, Clone)]
pub struct VersionSignatureTable {
    entries: Vec<SignatureEntry>,
}

impl Default for VersionSignatureTable {
    fn default() -> Self {
        Self::from_entries(
            VERSION_SIGNATURES
                .iter()
                .map(|s| (s.product, s.vulnerable_prefixes.iter().copied())),
        )
    }
}

impl VersionSignatureTable {
    /// Builds a table from `(product, prefixes)` pairs. Product keys are lowercased.
    pub fn from_entries<P, I, S>(entries: impl IntoIterator<Item = (P, I)>) -> Self
    where
        P: AsRef<str>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(product, prefixes)| SignatureEntry {
                product: product.as_ref().to_lowercase(),
                prefixes: prefixes.into_iter().map(Into::into).collect(),
            })
            .collect();
        Self { entries }
    }

    /// Number of product keys in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every (product key, prefix) pair matching the given service.
    ///
    /// A product can match several keys, but each key contributes at most one
    /// match: the first of its prefixes the version starts with.
    pub fn matches(&self, product: &str, version: &str) -> Vec<SignatureMatch> {
        let product = product.to_lowercase();
        self.entries
            .iter()
            .filter(|entry| product.contains(entry.product.as_str()))
            .filter_map(|entry| {
                entry
                    .prefixes
                    .iter()
                    .find(|prefix| version.starts_with(prefix.as_str()))
                    .map(|prefix| SignatureMatch {
                        product: entry.product.clone(),
                        prefix: prefix.clone(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vulners_is_the_enumeration_script() {
        assert!(is_vulnerability_enumeration_script("vulners"));
        assert!(!is_vulnerability_enumeration_script("http-vuln-cve2017-5638"));
    }

    #[test]
    fn builtin_table_has_one_entry_per_product() {
        let table = VersionSignatureTable::default();
        assert_eq!(table.len(), 8);
        assert!(!table.is_empty());

        let empty = VersionSignatureTable::from_entries(Vec::<(&str, Vec<&str>)>::new());
        assert!(empty.is_empty());
        assert!(empty.matches("Apache httpd", "2.2.3").is_empty());
    }

    #[test]
    fn first_matching_prefix_wins() {
        let table = VersionSignatureTable::default();
        let matches = table.matches("Apache httpd", "2.4.1");
        assert_eq!(
            matches,
            vec![SignatureMatch { product: "apache".into(), prefix: "2.4.1".into() }]
        );
    }

    #[test]
    fn overlapping_prefixes_report_once() {
        let table = VersionSignatureTable::from_entries([("openssh", ["6.", "6.6"])]);
        let matches = table.matches("OpenSSH", "6.6.1p1");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].prefix, "6.");
    }

    #[test]
    fn a_product_can_match_several_keys() {
        let table = VersionSignatureTable::default();
        let matches = table.matches("Apache Tomcat", "7.0.50");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].product, "tomcat");

        let table = VersionSignatureTable::from_entries([("apache", vec!["7."]), ("tomcat", vec!["7.0"])]);
        assert_eq!(table.matches("Apache Tomcat", "7.0.50").len(), 2);
    }

    #[test]
    fn no_match_for_safe_versions() {
        let table = VersionSignatureTable::default();
        assert!(table.matches("nginx", "1.25.3").is_empty());
        assert!(table.matches("lighttpd", "1.4.0").is_empty());
    }
}
