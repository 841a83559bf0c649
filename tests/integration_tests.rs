use page_ripper::asset_store::short_hash;
use page_ripper::rewriter::INLINE_STYLE_SEPARATOR;
use page_ripper::{
    FetchError, FetchedBytes, FetchedText, Fetcher, FileManager, PageRipper, RipError,
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tempfile::tempdir;
use url::Url;

#[derive(Clone)]
struct Canned {
    body: Vec<u8>,
    content_type: &'static str,
    final_url: Option<&'static str>,
}

/// Serves canned responses and records every URL it is asked for.
#[derive(Default)]
struct FakeFetcher {
    responses: HashMap<String, Canned>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    fn serve(mut self, url: &str, content_type: &'static str, body: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            Canned {
                body: body.as_bytes().to_vec(),
                content_type,
                final_url: None,
            },
        );
        self
    }

    fn redirect(mut self, url: &str, to: &'static str, content_type: &'static str, body: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            Canned {
                body: body.as_bytes().to_vec(),
                content_type,
                final_url: Some(to),
            },
        );
        self
    }

    fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
    }

    fn all_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn lookup(&self, url: &Url) -> Result<(Canned, Url), FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let canned = self.responses.get(url.as_str()).cloned().ok_or(FetchError::Status {
            url: url.to_string(),
            status: 404,
        })?;
        let final_url = match canned.final_url {
            Some(to) => Url::parse(to).unwrap(),
            None => url.clone(),
        };
        Ok((canned, final_url))
    }
}

impl Fetcher for FakeFetcher {
    async fn fetch_text(&self, url: &Url) -> Result<FetchedText, FetchError> {
        let (canned, final_url) = self.lookup(url)?;
        Ok(FetchedText {
            text: String::from_utf8_lossy(&canned.body).into_owned(),
            final_url,
        })
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<FetchedBytes, FetchError> {
        let (canned, final_url) = self.lookup(url)?;
        Ok(FetchedBytes {
            bytes: canned.body,
            final_url,
            content_type: canned.content_type.to_string(),
        })
    }
}

fn seed() -> Url {
    Url::parse("https://ex.test/").unwrap()
}

fn stored(stem: &str, url: &str, ext: &str) -> String {
    format!("{}_{}{}", stem, short_hash(url), ext)
}

async fn rip(fetcher: FakeFetcher, root: &Path) -> (PageRipper<FakeFetcher>, String) {
    let files = FileManager::new(root).unwrap();
    let mut ripper = PageRipper::new(fetcher, files);
    let summary = ripper.rip(&seed()).await.unwrap();
    let html = fs::read_to_string(&summary.index_path).unwrap();
    (ripper, html)
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let temp_dir = tempdir().unwrap();
    let fetcher = FakeFetcher::default()
        .serve(
            "https://ex.test/",
            "text/html",
            r#"<html><head><link rel="stylesheet" href="/s.css"><style>body{color:red}</style></head><body><img src="pic.png"></body></html>"#,
        )
        .serve("https://ex.test/s.css", "text/css", "body{background:url(bg.png)}")
        .serve("https://ex.test/pic.png", "image/png", "PIC")
        .serve("https://ex.test/bg.png", "image/png", "BG");

    let (_, html) = rip(fetcher, temp_dir.path()).await;
    let root = temp_dir.path();

    let css_name = stored("s", "https://ex.test/s.css", ".css");
    let pic_name = stored("pic", "https://ex.test/pic.png", ".png");
    let bg_name = stored("bg", "https://ex.test/bg.png", ".png");

    assert!(!html.contains("<style"), "{}", html);
    assert_eq!(html.matches(r#"href="css/inline_styles.css""#).count(), 1);
    assert!(html.contains(&format!(r#"<link rel="stylesheet" href="css/{}">"#, css_name)), "{}", html);
    assert!(html.contains(&format!(r#"<img src="img/{}">"#, pic_name)), "{}", html);

    assert_eq!(
        fs::read_to_string(root.join("css/inline_styles.css")).unwrap(),
        "body{color:red}"
    );
    assert_eq!(
        fs::read_to_string(root.join("css").join(&css_name)).unwrap(),
        format!("body{{background:url(../img/{})}}", bg_name)
    );
    assert_eq!(fs::read(root.join("img").join(&bg_name)).unwrap(), b"BG");
    assert_eq!(fs::read(root.join("img").join(&pic_name)).unwrap(), b"PIC");
}

#[tokio::test]
async fn test_inline_styles_are_joined_with_marker() {
    let temp_dir = tempdir().unwrap();
    let fetcher = FakeFetcher::default().serve(
        "https://ex.test/",
        "text/html",
        "<html><head><style>a{}</style></head><body><style>b{}</style></body></html>",
    );

    let (ripper, html) = rip(fetcher, temp_dir.path()).await;

    assert!(!html.contains("<style"));
    assert_eq!(html.matches("<link").count(), 1);
    assert!(html.contains(r#"<head><link rel="stylesheet" href="css/inline_styles.css"></head>"#), "{}", html);
    assert_eq!(
        fs::read_to_string(temp_dir.path().join("css/inline_styles.css")).unwrap(),
        format!("a{{}}{}b{{}}", INLINE_STYLE_SEPARATOR)
    );
    // the synthetic stylesheet is never fetched as remote CSS
    assert_eq!(ripper.fetcher().all_calls(), vec!["https://ex.test/"]);
}

#[tokio::test]
async fn test_same_asset_is_fetched_once() {
    let temp_dir = tempdir().unwrap();
    let fetcher = FakeFetcher::default()
        .serve(
            "https://ex.test/",
            "text/html",
            r##"<img id="a" src="/a.png"><img id="b" src="a.png#frag"><img id="c" src="https://ex.test/a.png">"##,
        )
        .serve("https://ex.test/a.png", "image/png", "A");

    let (ripper, html) = rip(fetcher, temp_dir.path()).await;

    assert_eq!(ripper.fetcher().calls_to("https://ex.test/a.png"), 1);
    assert_eq!(ripper.store().len(), 1);
    let local = format!("img/{}", stored("a", "https://ex.test/a.png", ".png"));
    assert_eq!(html.matches(&local).count(), 3, "{}", html);
}

#[tokio::test]
async fn test_skipped_schemes_are_never_fetched() {
    let temp_dir = tempdir().unwrap();
    let fetcher = FakeFetcher::default().serve(
        "https://ex.test/",
        "text/html",
        r#"<img src="data:image/png;base64,AAAA"><img src="javascript:void(0)"><link rel="icon" href="mailto:x@ex.test"><script src="tel:123"></script>"#,
    );

    let (ripper, html) = rip(fetcher, temp_dir.path()).await;

    assert_eq!(ripper.fetcher().all_calls(), vec!["https://ex.test/"]);
    assert!(html.contains(r#"src="data:image/png;base64,AAAA""#));
    assert!(html.contains(r#"src="javascript:void(0)""#));
    assert!(html.contains(r#"href="mailto:x@ex.test""#));
    assert!(html.contains(r#"src="tel:123""#));
}

#[tokio::test]
async fn test_non_image_content_is_not_saved() {
    let temp_dir = tempdir().unwrap();
    let fetcher = FakeFetcher::default()
        .serve("https://ex.test/", "text/html", r#"<img src="oops.png">"#)
        .serve("https://ex.test/oops.png", "text/html", "<html>not found</html>");

    let (ripper, html) = rip(fetcher, temp_dir.path()).await;

    assert!(html.contains(r#"<img src="oops.png">"#), "{}", html);
    assert!(ripper.store().is_empty());
    assert_eq!(fs::read_dir(temp_dir.path().join("img")).unwrap().count(), 0);
}

#[tokio::test]
async fn test_failed_assets_leave_references_untouched() {
    let temp_dir = tempdir().unwrap();
    let fetcher = FakeFetcher::default().serve(
        "https://ex.test/",
        "text/html",
        r#"<link rel="stylesheet" href="gone.css"><script src="gone.js"></script><meta property="og:image" content="gone.png">"#,
    );

    let (_, html) = rip(fetcher, temp_dir.path()).await;

    assert!(html.contains(r#"href="gone.css""#));
    assert!(html.contains(r#"src="gone.js""#));
    assert!(html.contains(r#"content="gone.png""#));
}

#[tokio::test]
async fn test_root_failure_is_fatal() {
    let temp_dir = tempdir().unwrap();
    let files = FileManager::new(temp_dir.path()).unwrap();
    let mut ripper = PageRipper::new(FakeFetcher::default(), files);

    let result = ripper.rip(&seed()).await;

    assert!(matches!(result, Err(RipError::RootFetch(FetchError::Status { status: 404, .. }))));
    assert!(!temp_dir.path().join("index.html").exists());
}

#[tokio::test]
async fn test_srcset_is_flattened_to_1x() {
    let temp_dir = tempdir().unwrap();
    let fetcher = FakeFetcher::default()
        .serve(
            "https://ex.test/",
            "text/html",
            r#"<picture><source srcset="small.webp 480w, missing.webp 800w"></picture><img srcset="a.png 1x, b.png 2x">"#,
        )
        .serve("https://ex.test/small.webp", "image/webp", "S")
        .serve("https://ex.test/a.png", "image/png", "A")
        .serve("https://ex.test/b.png", "image/png", "B");

    let (_, html) = rip(fetcher, temp_dir.path()).await;

    let small = stored("small", "https://ex.test/small.webp", ".webp");
    let a = stored("a", "https://ex.test/a.png", ".png");
    let b = stored("b", "https://ex.test/b.png", ".png");
    assert!(html.contains(&format!(r#"srcset="img/{} 1x""#, small)), "{}", html);
    assert!(html.contains(&format!(r#"srcset="img/{} 1x, img/{} 1x""#, a, b)), "{}", html);
}

#[tokio::test]
async fn test_icons_scripts_and_meta_images() {
    let temp_dir = tempdir().unwrap();
    let fetcher = FakeFetcher::default()
        .serve(
            "https://ex.test/",
            "text/html",
            r#"<head><link rel="shortcut icon" href="/favicon"><meta name="twitter:image" content="https://cdn.test/card.jpg"><script src="/app"></script></head>"#,
        )
        .serve("https://ex.test/favicon", "image/x-icon", "ICO")
        .serve("https://cdn.test/card.jpg", "image/jpeg", "JPG")
        .serve("https://ex.test/app", "", "console.log(1)");

    let (_, html) = rip(fetcher, temp_dir.path()).await;

    let icon = stored("favicon", "https://ex.test/favicon", ".ico");
    let card = stored("card", "https://cdn.test/card.jpg", ".jpg");
    let app = stored("app", "https://ex.test/app", ".js");
    assert!(html.contains(&format!(r#"href="img/{}""#, icon)), "{}", html);
    assert!(html.contains(&format!(r#"content="img/{}""#, card)), "{}", html);
    assert!(html.contains(&format!(r#"src="js/{}""#, app)), "{}", html);
    assert_eq!(
        fs::read_to_string(temp_dir.path().join("js").join(&app)).unwrap(),
        "console.log(1)"
    );
}

#[tokio::test]
async fn test_nested_imports_are_followed() {
    let temp_dir = tempdir().unwrap();
    let fetcher = FakeFetcher::default()
        .serve(
            "https://ex.test/",
            "text/html",
            r#"<link rel="stylesheet" href="/css/main.css">"#,
        )
        .serve(
            "https://ex.test/css/main.css",
            "text/css",
            "@import \"parts/nested.css\";\nbody { background: url('font.woff') }",
        )
        .serve(
            "https://ex.test/css/parts/nested.css",
            "text/css",
            "h1 {\n  background: url( \"../img/deep.png\" );\n}",
        )
        .serve("https://ex.test/css/img/deep.png", "image/png", "DEEP")
        .serve("https://ex.test/css/font.woff", "font/woff", "FONT");

    let (ripper, _) = rip(fetcher, temp_dir.path()).await;
    let css_dir = temp_dir.path().join("css");

    let main = stored("main", "https://ex.test/css/main.css", ".css");
    let nested = stored("nested", "https://ex.test/css/parts/nested.css", ".css");
    let deep = stored("deep", "https://ex.test/css/img/deep.png", ".png");

    assert_eq!(
        fs::read_to_string(css_dir.join(&main)).unwrap(),
        format!("@import \"{}\";\nbody {{ background: url('font.woff') }}", nested)
    );
    assert_eq!(
        fs::read_to_string(css_dir.join(&nested)).unwrap(),
        format!("h1 {{\n  background: url( \"../img/{}\" );\n}}", deep)
    );
    // fonts are tried as images and dropped
    assert_eq!(ripper.fetcher().calls_to("https://ex.test/css/font.woff"), 1);
    assert!(ripper.store().lookup(&Url::parse("https://ex.test/css/font.woff").unwrap()).is_none());
}

#[tokio::test]
async fn test_unchanged_stylesheet_is_not_rewritten() {
    let temp_dir = tempdir().unwrap();
    let css = "body { color: red; background: url(data:image/png;base64,AAAA) }";
    let fetcher = FakeFetcher::default()
        .serve("https://ex.test/", "text/html", r#"<link rel="stylesheet" href="a.css">"#)
        .serve("https://ex.test/a.css", "text/css", css);

    let (ripper, _) = rip(fetcher, temp_dir.path()).await;

    let local = temp_dir
        .path()
        .join("css")
        .join(stored("a", "https://ex.test/a.css", ".css"));
    assert_eq!(fs::read_to_string(local).unwrap(), css);
    assert_eq!(ripper.fetcher().all_calls().len(), 2);
}

#[tokio::test]
async fn test_redirected_stylesheet_named_after_final_url() {
    let temp_dir = tempdir().unwrap();
    let fetcher = FakeFetcher::default()
        .serve(
            "https://ex.test/",
            "text/html",
            r#"<link rel="stylesheet" href="/old/site.css"><link rel="stylesheet" href="/old/site.css#again">"#,
        )
        .redirect(
            "https://ex.test/old/site.css",
            "https://static.ex.test/v2/site.css",
            "text/css",
            "a{background:url(tile.png)}",
        )
        .serve("https://ex.test/old/tile.png", "image/png", "TILE");

    let (ripper, html) = rip(fetcher, temp_dir.path()).await;

    let name = stored("site", "https://static.ex.test/v2/site.css", ".css");
    assert_eq!(html.matches(&format!("css/{}", name)).count(), 2, "{}", html);
    assert_eq!(ripper.fetcher().calls_to("https://ex.test/old/site.css"), 1);
    // nested references resolve against the URL the stylesheet was requested by
    assert_eq!(ripper.fetcher().calls_to("https://ex.test/old/tile.png"), 1);
}

#[tokio::test]
async fn test_import_redirecting_to_rewritten_sheet_keeps_rewrite() {
    let temp_dir = tempdir().unwrap();
    let fetcher = FakeFetcher::default()
        .serve(
            "https://ex.test/",
            "text/html",
            r#"<link rel="stylesheet" href="/a.css"><link rel="stylesheet" href="/main.css">"#,
        )
        .serve("https://ex.test/a.css", "text/css", "x{background:url(bg.png)}")
        .serve("https://ex.test/main.css", "text/css", r#"@import "alias.css";"#)
        .redirect(
            "https://ex.test/alias.css",
            "https://ex.test/a.css",
            "text/css",
            "x{background:url(bg.png)}",
        )
        .serve("https://ex.test/bg.png", "image/png", "BG");

    let (ripper, _) = rip(fetcher, temp_dir.path()).await;

    let css_dir = temp_dir.path().join("css");
    let a_name = stored("a", "https://ex.test/a.css", ".css");
    let a = fs::read_to_string(css_dir.join(&a_name)).unwrap();
    assert_eq!(
        a,
        format!("x{{background:url(../img/{})}}", stored("bg", "https://ex.test/bg.png", ".png"))
    );
    let main = fs::read_to_string(css_dir.join(stored("main", "https://ex.test/main.css", ".css"))).unwrap();
    assert_eq!(main, format!(r#"@import "{}";"#, a_name));
    assert_eq!(ripper.fetcher().calls_to("https://ex.test/alias.css"), 1);
    assert_eq!(ripper.fetcher().calls_to("https://ex.test/bg.png"), 1);
    assert_eq!(fs::read_dir(&css_dir).unwrap().count(), 2);
}

#[tokio::test]
async fn test_rips_are_deterministic() {
    let page = r#"<html><head><link rel="stylesheet" href="s.css"><style>p{}</style></head><body><img src="i.gif" srcset="i.gif 1x, j.gif 2x"></body></html>"#;
    let build = || {
        FakeFetcher::default()
            .serve("https://ex.test/", "text/html", page)
            .serve("https://ex.test/s.css", "text/css", "p{background:url(i.gif)}")
            .serve("https://ex.test/i.gif", "image/gif", "I")
            .serve("https://ex.test/j.gif", "image/gif", "J")
    };

    let first_dir = tempdir().unwrap();
    let second_dir = tempdir().unwrap();
    let (_, first) = rip(build(), first_dir.path()).await;
    let (_, second) = rip(build(), second_dir.path()).await;

    assert_eq!(first, second);
    for bucket in ["css", "img"] {
        let names = |root: &Path| {
            let mut names: Vec<_> = fs::read_dir(root.join(bucket))
                .unwrap()
                .map(|e| e.unwrap().file_name())
                .collect();
            names.sort();
            names
        };
        assert_eq!(names(first_dir.path()), names(second_dir.path()));
    }
}
