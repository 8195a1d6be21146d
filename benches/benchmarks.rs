use criterion::{criterion_group, criterion_main, Criterion};
use page_mirror::css::{rewrite_urls, scan_urls, CssEdit};
use page_mirror::dom::DocumentTree;
use page_mirror::registry::sanitize_filename;
use page_mirror::url_normalizer::resolve;
use page_mirror::{FileManager, HtmlParser, ResourceRegistry, ResourceType};
use std::hint::black_box;
use tempfile::tempdir;
use url::Url;

const PAGE: &str = r#"
    <html>
        <head>
            <link rel="stylesheet" href="/style.css">
            <script src="/script.js"></script>
            <link rel="stylesheet" href="/theme.css">
            <script src="/utils.js"></script>
            <style>.hero { background: url('/images/hero.jpg'); }</style>
        </head>
        <body>
            <img src="/logo.png" alt="Logo">
            <img src="/banner.jpg" alt="Banner">
            <div style="background-image: url(/images/tile.png)"></div>
            <a href="/about">About</a>
            <script>window.ready = true;</script>
        </body>
    </html>
"#;

const STYLESHEET: &str = r#"
    @import "base.css";
    @font-face { font-family: Inter; src: url(/fonts/inter.woff2) format('woff2'); }
    .bg1 { background-image: url('/images/bg1.jpg'); }
    .bg2 { background: url("/images/bg2.jpg"); }
    .bg3 { background-image: url(/images/bg3.jpg); }
    .bg4 { background-color: red; }
    .bg5 { background: url(data:image/png;base64,AAAA); }
"#;

fn bench_html_parsing(c: &mut Criterion) {
    c.bench_function("parse_document", |b| {
        b.iter(|| DocumentTree::parse(black_box(PAGE)));
    });
}

fn bench_reference_extraction(c: &mut Criterion) {
    let tree = DocumentTree::parse(PAGE);
    let parser = HtmlParser::new();

    c.bench_function("extract_references", |b| {
        b.iter(|| parser.extract_references(black_box(&tree)));
    });
}

fn bench_css_scanning(c: &mut Criterion) {
    c.bench_function("scan_css_urls", |b| {
        b.iter(|| scan_urls(black_box(STYLESHEET)));
    });

    c.bench_function("rewrite_css_urls", |b| {
        b.iter(|| {
            rewrite_urls(black_box(STYLESHEET), |u| {
                Some(CssEdit::Url(format!("../images/{}", u.raw.len())))
            })
        });
    });
}

fn bench_url_resolution(c: &mut Criterion) {
    let base = Url::parse("https://example.com/subdir/").unwrap();
    let test_urls = vec![
        "../style.css",
        "./script.js",
        "images/photo.jpg",
        "https://cdn.example.com/style.css",
        "//cdn.example.com/script.js",
        "../../../assets/logo.png",
        "./nested/path/file.css#section",
        "data:image/png;base64,AAAA",
    ];

    c.bench_function("resolve_urls", |b| {
        b.iter(|| {
            for url in &test_urls {
                let _resolved = resolve(black_box(url), &base, "example.com");
            }
        });
    });
}

fn bench_path_sanitization(c: &mut Criterion) {
    let test_names = vec![
        "normal.css",
        "name with spaces.png",
        "a:b<c>d|e?f*g.js",
        "my%20font.woff2",
    ];

    c.bench_function("sanitize_filenames", |b| {
        b.iter(|| {
            for name in &test_names {
                let _sanitized = sanitize_filename(black_box(name));
            }
        });
    });
}

fn bench_registration(c: &mut Criterion) {
    let base = Url::parse("https://example.com/").unwrap();
    let resolved: Vec<_> = (0..200)
        .map(|i| resolve(&format!("/assets/{}/logo.png", i % 50), &base, "example.com").unwrap())
        .collect();

    c.bench_function("register_with_collisions", |b| {
        b.iter(|| {
            let registry = ResourceRegistry::new("example.com");
            for url in &resolved {
                registry.register(black_box(url), ResourceType::Image);
            }
            registry.len()
        });
    });
}

fn bench_file_saving(c: &mut Criterion) {
    let temp_dir = tempdir().unwrap();
    let file_manager = FileManager::new(temp_dir.path()).unwrap();
    let test_files = vec![
        ("index.html", b"<html>Content</html>".to_vec()),
        ("css/inline.css", b"body { color: red; }".to_vec()),
        ("js/inline.js", b"window.ready = true;".to_vec()),
        ("images/logo.png", vec![0x89, b'P', b'N', b'G']),
    ];

    c.bench_function("save_multiple_files", |b| {
        b.iter(|| {
            for (path, content) in &test_files {
                let _result = file_manager.save_file(black_box(path), black_box(content));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_html_parsing,
    bench_reference_extraction,
    bench_css_scanning,
    bench_url_resolution,
    bench_path_sanitization,
    bench_registration,
    bench_file_saving,
);
criterion_main!(benches);
