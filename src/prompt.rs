//! Prompt construction for LLM.txt generation.

use chrono::NaiveDate;

use crate::metadata::PageMetadata;
use crate::validate::TargetUrl;

pub const LONG_URL_THRESHOLD: usize = 100;
pub const NOT_FOUND: &str = "not found";

pub const SYSTEM_INSTRUCTIONS: &str = "You are an SEO and web-analysis expert who writes structured, \
useful, search-engine-friendly LLM.txt files. You produce practical, well-formatted, actionable \
Markdown.";

/// Facts derived from the target URL alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlFacts {
    pub host: String,
    pub scheme: String,
    pub path: String,
    pub path_segments: usize,
    pub url_length: usize,
    pub has_query: bool,
}

impl UrlFacts {
    pub fn derive(target: &TargetUrl) -> Self {
        let url = target.url();
        let path = url.path().to_owned();
        let path_segments = path.split('/').filter(|s| !s.is_empty()).count();
        Self {
            host: url.host_str().unwrap_or_default().to_owned(),
            scheme: url.scheme().to_owned(),
            path,
            path_segments,
            url_length: target.as_str().chars().count(),
            has_query: url.query().is_some_and(|q| !q.is_empty()),
        }
    }

    pub fn is_https(&self) -> bool {
        self.scheme == "https"
    }

    pub fn is_too_long(&self) -> bool {
        self.url_length > LONG_URL_THRESHOLD
    }

    pub fn path_length(&self) -> usize {
        self.path.chars().count()
    }
}

fn or_not_found(value: &str) -> &str {
    let value = value.trim();
    if value.is_empty() { NOT_FOUND } else { value }
}

/// Builds the user prompt sent to the completion API.
///
/// Output depends only on the arguments, so two calls with the same target, metadata and
/// date produce identical text.
pub fn build_prompt(target: &TargetUrl, metadata: &PageMetadata, today: NaiveDate) -> String {
    let facts = UrlFacts::derive(target);
    let url = target.as_str();
    let date = today.format("%Y-%m-%d");

    let evidence_note = if metadata.is_empty() {
        "IMPORTANT: The page could not be retrieved, so no real content is available. Base the \
analysis on the URL and domain only, and state clearly that every statement about the site's \
content, purpose and audience is an inference from the URL."
    } else {
        "IMPORTANT: Use the real data above to ground the analysis and the recommendations. Where \
information is missing, infer what is needed and say that it is inferred."
    };

    let structure = if facts.path_segments == 0 {
        "Domain root (no path)".to_owned()
    } else {
        format!(
            "Hierarchical path with {} segment(s): `{}`",
            facts.path_segments, facts.path
        )
    };
    let parameters = if facts.has_query {
        "Contains query parameters"
    } else {
        "Clean URL without parameters"
    };
    let length_advice = if facts.is_too_long() {
        format!("Consider shortening the URL (more than {LONG_URL_THRESHOLD} characters)")
    } else {
        "URL length is fine".to_owned()
    };
    let https_status = if facts.is_https() {
        "Implemented correctly"
    } else {
        "Not in use: migrating to HTTPS is a priority"
    };

    format!(
        "Act as an SEO and web-analysis expert. Your task is to analyze the following URL and \
produce a complete, well-structured LLM.txt file.

URL to analyze: {url}

--- REAL EXTRACTED DATA ---
Title: {title}
Description: {description}
H1: {h1}
H2: {h2}
---------------------------

{evidence_note}

Return only the finished document, in Markdown, following this outline:

# LLM.txt - [Title inferred from the page or URL]

## Basic Site Information
- **URL:** {url}
- **Domain:** {host}
- **Protocol:** {scheme}
- **Analysis date:** {date}

## URL Analysis
- **URL structure:** {structure}
- **Path length:** {path_length} characters
- **URL length:** {url_length} characters
- **Parameters:** {parameters}

## Domain-Based Inferences
Based on the domain \"{host}\":

### Probable Site Type
[Infer whether the site is commercial (.com), educational (.edu), organizational (.org), etc.]

### Potential Keywords
[Extract keywords from the domain, the path and the real data above]

### Recommended LLM.txt Structure
1. **Basic metadata** - title, description, author
2. **Main content** - summary of the site's purpose
3. **Navigation structure** - main menus and key pages
4. **Contact information** - company or organization details
5. **SEO context** - main keywords and target market

## Specific SEO Recommendations
- **URL optimization:** {length_advice}
- **HTTPS:** {https_status}
- **Semantic structure:** implement Schema.org structured data

## Context for LLMs
This LLM.txt file provides context about the website located at {url}.

### Inferred Purpose
[Infer the purpose of the site from its URL, domain and real data]

### Probable Target Audience
[Infer the audience from the domain type and structure]

### Expected Content
[Describe the kind of content a visitor would expect to find]

## Implementation Template

To complete this LLM.txt with real site information, include:

1. **Actual page title**
2. **Current meta description**
3. **Heading structure (H1-H6)**
4. **Summarized main content**
5. **Important internal links**
6. **Contact information**
7. **Main products or services**
8. **Blog or news (if applicable)**

## Suggested Monitoring Metrics
- Page load time
- Core Web Vitals
- Bounce rate
- Conversions (for e-commerce)
- Organic traffic

---
*This LLM.txt was generated automatically as a base structure. Complete it with specific \
information from the real website to get the most out of it.*",
        title = or_not_found(&metadata.title),
        description = or_not_found(&metadata.description),
        h1 = or_not_found(&metadata.h1),
        h2 = or_not_found(&metadata.h2),
        host = facts.host,
        scheme = facts.scheme,
        path_length = facts.path_length(),
        url_length = facts.url_length,
    )
}
