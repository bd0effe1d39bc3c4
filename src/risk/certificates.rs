use super::RiskTier;
use crate::models::Product;

const GENERAL_KEYWORDS: &[&str] = &[
    "greentag",
    "green tag",
    "geca",
    "greenguard",
    "bifma",
    "afrdi",
    "cradle to cradle",
    "c2c",
    "declare",
    "hpd",
    "health product declaration",
    "fsc",
    "pefc",
    "responsible wood",
    "responsible steel",
    "oeko-tex",
    "scs indoor advantage",
    "certificate",
    "certified",
    "certification",
    "ecolabel",
    "green rate",
    "health rate",
    "lca rate",
];

const EPD_KEYWORDS: &[&str] = &[
    "epd",
    "environmental product declaration",
    "iso 14025",
    "en 15804",
    "ibu",
    "epd australasia",
    "epd international",
    "environdec",
];

/// Certificate evidence found on a product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CertificateState {
    pub has_any: bool,
    pub has_epd: bool,
}

impl CertificateState {
    /// Green with an EPD certificate, Yellow with any other, Red with none.
    pub fn tier(self) -> RiskTier {
        if self.has_epd {
            RiskTier::Green
        } else if self.has_any {
            RiskTier::Yellow
        } else {
            RiskTier::Red
        }
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let text = text.to_lowercase();
    keywords.iter().any(|k| text.contains(k))
}

fn free_text(product: &Product) -> String {
    [
        &product.product_name,
        &product.product_description,
        &product.long_description,
        &product.description,
        &product.title,
        &product.certifications_text,
        &product.notes,
    ]
    .into_iter()
    .map(|f| f.as_deref().unwrap_or_default())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Heuristic detection over flags, certification records, certificate URL
/// fields and keywords in free text or certification names. Broad keywords
/// such as "certified" count as evidence.
pub fn detect(product: &Product) -> CertificateState {
    let has_flag = product.has_certifications.unwrap_or(false);
    let has_array = product.has_certifications();
    let has_url = [
        &product.certificate_url,
        &product.certification_url,
        &product.green_tag_url,
        &product.greentag_url,
        &product.hpd_url,
    ]
    .into_iter()
    .any(Option::is_some);

    let text = free_text(product);
    let names = product.certification_names().collect::<Vec<_>>().join(" ");

    let general_by_text = contains_any(&text, GENERAL_KEYWORDS) || contains_any(&names, GENERAL_KEYWORDS);
    let epd_by_text = contains_any(&text, EPD_KEYWORDS) || contains_any(&names, EPD_KEYWORDS);

    CertificateState {
        has_any: has_flag || has_array || has_url || general_by_text,
        has_epd: product.epd_url.is_some() || epd_by_text,
    }
}

/// Certificate links from the known URL fields, then from each certification
/// record's `url`, `link` and `certificate_url`.
pub fn certificate_urls(product: &Product) -> Vec<String> {
    let fields = [
        &product.certificate_url,
        &product.certification_url,
        &product.green_tag_url,
        &product.greentag_url,
        &product.hpd_url,
        &product.hpd_certificate_url,
    ];
    let records = product
        .certifications
        .iter()
        .flat_map(|c| [&c.url, &c.link, &c.certificate_url]);

    fields
        .into_iter()
        .chain(records)
        .filter_map(|v| v.as_deref().map(str::trim))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Certification;

    #[test]
    fn test_empty_product_is_red() {
        let state = detect(&Product::default());
        assert_eq!(state, CertificateState::default());
        assert_eq!(state.tier(), RiskTier::Red);
    }

    #[test]
    fn test_general_certificate_is_yellow() {
        let product = Product {
            certifications: vec![Certification {
                certification: Some("GreenTag GreenRate".into()),
                ..Certification::default()
            }],
            ..Product::default()
        };
        let state = detect(&product);
        assert!(state.has_any && !state.has_epd);
        assert_eq!(state.tier(), RiskTier::Yellow);
    }

    #[test]
    fn test_epd_evidence_is_green() {
        let by_url = Product {
            epd_url: Some("products/x.pdf".into()),
            ..Product::default()
        };
        assert_eq!(detect(&by_url).tier(), RiskTier::Green);

        let by_text = Product {
            product_description: Some("Verified to EN 15804 +A2".into()),
            ..Product::default()
        };
        assert_eq!(detect(&by_text).tier(), RiskTier::Green);
    }

    #[test]
    fn test_marketing_copy_counts_as_certificate() {
        let product = Product {
            notes: Some("Certified quality timber".into()),
            ..Product::default()
        };
        assert_eq!(detect(&product).tier(), RiskTier::Yellow);
    }

    #[test]
    fn test_flag_and_url_fields() {
        let flagged = Product {
            has_certifications: Some(true),
            ..Product::default()
        };
        assert!(detect(&flagged).has_any);

        let with_url = Product {
            hpd_url: Some("https://hpd.example/1".into()),
            ..Product::default()
        };
        assert!(detect(&with_url).has_any);
    }

    #[test]
    fn test_certificate_urls_collects_fields_and_records() {
        let product = Product {
            greentag_url: Some(" https://gt.example/a ".into()),
            hpd_certificate_url: Some("https://hpd.example/b".into()),
            certifications: vec![Certification {
                link: Some("https://fsc.example/c".into()),
                url: Some("  ".into()),
                ..Certification::default()
            }],
            ..Product::default()
        };
        assert_eq!(
            certificate_urls(&product),
            vec![
                "https://gt.example/a",
                "https://hpd.example/b",
                "https://fsc.example/c"
            ]
        );
    }
}
