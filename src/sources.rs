use anyhow::Context as _;
use url::Url;

pub const DEFAULT_OPEN_LIBRARY_BASE: &str = "https://covers.openlibrary.org";
pub const DEFAULT_GOOGLE_BOOKS_BASE: &str = "https://books.google.com";
pub const DEFAULT_AMAZON_IMAGES_BASE: &str = "https://images-na.ssl-images-amazon.com";

const MIN_ISBN_LEN: usize = 10;

/// Base URLs of the cover sources, tried in the order listed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverSources {
    pub open_library: String,
    pub google_books: String,
    pub amazon_images: String,
}

impl Default for CoverSources {
    fn default() -> Self {
        Self {
            open_library: DEFAULT_OPEN_LIBRARY_BASE.to_owned(),
            google_books: DEFAULT_GOOGLE_BOOKS_BASE.to_owned(),
            amazon_images: DEFAULT_AMAZON_IMAGES_BASE.to_owned(),
        }
    }
}

impl CoverSources {
    pub fn new(open_library: &str, google_books: &str, amazon_images: &str) -> anyhow::Result<Self> {
        Ok(Self {
            open_library: normalize_base(open_library).context("open library base url")?,
            google_books: normalize_base(google_books).context("google books base url")?,
            amazon_images: normalize_base(amazon_images).context("amazon images base url")?,
        })
    }

    /// Candidate cover URLs for a book, most reliable source first.
    ///
    /// `title` is accepted so title-based sources can be added without
    /// changing callers; none of the current sources use it.
    ///
    /// The Google Books URL carries an empty `id=` parameter and in practice
    /// answers with a non-image page. It is kept as a candidate because no
    /// documented replacement keyed on ISBN exists for that endpoint.
    pub fn candidate_urls(&self, isbn: &str, book_id: &str, _title: &str) -> Vec<String> {
        let mut urls = Vec::new();

        if isbn.len() >= MIN_ISBN_LEN {
            let isbn: String = isbn
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == 'X')
                .collect();

            urls.push(format!("{}/b/isbn/{isbn}-L.jpg", self.open_library));
            urls.push(format!("{}/b/isbn/{isbn}-M.jpg", self.open_library));
            urls.push(format!(
                "{}/books/content?id=&printsec=frontcover&img=1&zoom=1&imgtk={isbn}",
                self.google_books
            ));
        }

        if !book_id.is_empty() {
            urls.push(format!(
                "{}/images/P/{book_id}.01.L.jpg",
                self.amazon_images
            ));
        }

        urls
    }
}

fn normalize_base(base: &str) -> anyhow::Result<String> {
    let base = base.trim().trim_end_matches('/');
    let parsed = Url::parse(base).with_context(|| format!("parse url: {base}"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("url must be http/https: {base}");
    }
    Ok(base.to_owned())
}
