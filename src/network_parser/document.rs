//! 已获取页面的结构化扫描。
//!
//! wiki 页面结构已知且固定，这里不引入完整的 DOM 解析，
//! 而是用缓存正则加局部块扫描来定位需要的元素：
//! 成员表格（`wikitable`）、锚点属性、tabber 区块、原图容器。

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

fn re_wikitable() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r#"(?is)<table\b[^>]*class\s*=\s*["'][^"']*wikitable[^"']*["'][^>]*>(.*?)</table>"#)
            .unwrap()
    })
}

fn re_anchor_tag() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?is)<a\b[^>]*>").unwrap())
}

fn re_div_open() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?is)<div\b[^>]*>").unwrap())
}

fn re_title_attr() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r#"(?is)\btitle\s*=\s*["']([^"']*)["']"#).unwrap())
}

fn re_href_attr() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r#"(?is)\bhref\s*=\s*["']([^"']*)["']"#).unwrap())
}

fn re_class_attr() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r#"(?is)\bclass\s*=\s*["']([^"']*)["']"#).unwrap())
}

/// 一次请求得到的页面。
#[derive(Debug, Clone)]
pub struct Document {
    url: String,
    html: String,
}

impl Document {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// 所有成员表格（`class="wikitable"`）的内部 HTML，按文档顺序。
    pub fn member_tables(&self) -> Vec<&str> {
        re_wikitable()
            .captures_iter(&self.html)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// 定位 tabber 区块：`<div class="... tabbertab ..." title="...">`，
    /// title 与 `tab_title` 完全相等。返回该 div 的内部 HTML。
    pub fn tabber_section(&self, tab_title: &str) -> Option<&str> {
        self.find_div_block(|class, title| {
            has_class_token(class, "tabbertab") && title == Some(tab_title)
        })
    }

    /// 文件页上的原图容器（`class="fullImageLink"`）里的锚点 href。
    pub fn full_image_href(&self) -> Option<String> {
        let block = self.find_div_block(|class, _| has_class_token(class, "fullImageLink"))?;
        anchors(block).into_iter().find_map(|a| a.href)
    }

    /// 扫描 div 开始标签，属性满足 `matches` 时返回配平后的内部块。
    fn find_div_block<F>(&self, matches: F) -> Option<&str>
    where
        F: Fn(Option<&str>, Option<&str>) -> bool,
    {
        for m in re_div_open().find_iter(&self.html) {
            let tag = m.as_str();
            let class = attr_value(re_class_attr(), tag);
            let title = attr_value(re_title_attr(), tag);
            if matches(class.as_deref(), title.as_deref()) {
                return balanced_div_inner(&self.html, m.end());
            }
        }
        None
    }
}

/// 一个 `<a>` 标签上本工具关心的属性。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Anchor {
    pub title: Option<String>,
    pub href: Option<String>,
    /// class 属性的第一个 token（例如 `class="image lazy"` → `image`）。
    pub first_class: Option<String>,
}

/// 按文档顺序扫描片段里的所有锚点开始标签。
pub fn anchors(fragment: &str) -> Vec<Anchor> {
    re_anchor_tag()
        .find_iter(fragment)
        .map(|m| {
            let tag = m.as_str();
            Anchor {
                title: attr_value(re_title_attr(), tag),
                href: attr_value(re_href_attr(), tag).map(|h| unescape_attr(&h).into_owned()),
                first_class: attr_value(re_class_attr(), tag)
                    .and_then(|c| c.split_whitespace().next().map(str::to_string)),
            }
        })
        .collect()
}

/// 相对链接补全为绝对链接。
pub fn absolutize(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if href.starts_with("//") {
        let scheme = base.split("://").next().unwrap_or("https");
        return format!("{scheme}:{href}");
    }
    let base = base.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{base}{href}")
    } else {
        format!("{base}/{href}")
    }
}

fn attr_value(re: &Regex, tag: &str) -> Option<String> {
    re.captures(tag)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
}

fn has_class_token(class: Option<&str>, token: &str) -> bool {
    class.is_some_and(|c| c.split_whitespace().any(|t| t == token))
}

/// 属性里的 URL 常被转义成 `&amp;`。
fn unescape_attr(src: &str) -> Cow<'_, str> {
    if src.contains("&amp;") {
        return Cow::Owned(src.replace("&amp;", "&"));
    }
    Cow::Borrowed(src)
}

/// 从 `start`（某个 div 开始标签之后）起配平嵌套 div，返回内部 HTML。
///
/// 服装区块内部还有别的 div，非贪婪匹配到第一个 `</div>` 会截断，
/// 所以这里用深度计数扫描。
fn balanced_div_inner(html: &str, start: usize) -> Option<&str> {
    let lower = html.to_ascii_lowercase();
    let mut depth = 1usize;
    let mut pos = start;

    while depth > 0 {
        let open = lower[pos..].find("<div");
        let close = lower[pos..].find("</div");
        match (open, close) {
            (Some(o), Some(c)) if o < c => {
                depth += 1;
                pos += o + 4;
            }
            (_, Some(c)) => {
                depth -= 1;
                if depth == 0 {
                    return Some(&html[start..pos + c]);
                }
                pos += c + 5;
            }
            // 文档截断：没有配平的结束标签
            _ => return None,
        }
    }
    None
}
