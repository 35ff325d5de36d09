use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::Context as _;

pub const READ_SHELF: &str = "read";

/// One row of a Goodreads-style library export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookRow {
    pub title: String,
    pub author: String,
    pub book_id: String,
    pub isbn: String,
    pub exclusive_shelf: String,
    pub date_read: String,
}

impl BookRow {
    /// Finished books sit on the `read` shelf and carry a completion date.
    pub fn is_finished(&self) -> bool {
        self.exclusive_shelf == READ_SHELF && !self.date_read.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Columns {
    title: Option<usize>,
    author: Option<usize>,
    book_id: Option<usize>,
    isbn: Option<usize>,
    exclusive_shelf: Option<usize>,
    date_read: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        Self {
            title: find("Title"),
            author: find("Author"),
            book_id: find("Book Id"),
            isbn: find("ISBN"),
            exclusive_shelf: find("Exclusive Shelf"),
            date_read: find("Date Read"),
        }
    }

    fn row(&self, record: &csv::StringRecord) -> BookRow {
        let field = |idx: Option<usize>| {
            idx.and_then(|idx| record.get(idx))
                .unwrap_or_default()
                .to_owned()
        };
        BookRow {
            title: field(self.title),
            author: field(self.author),
            book_id: field(self.book_id),
            isbn: field(self.isbn),
            exclusive_shelf: field(self.exclusive_shelf),
            date_read: field(self.date_read),
        }
    }
}

/// Streams [`BookRow`]s from a CSV export in file order.
///
/// Missing columns read as empty strings and malformed records are skipped.
/// A read failure on the underlying input is yielded once as an error and
/// ends the iteration.
pub struct ReadingList<R = File> {
    records: csv::StringRecordsIntoIter<R>,
    columns: Columns,
    failed: bool,
}

impl ReadingList<File> {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file =
            File::open(path).with_context(|| format!("open reading list: {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("read csv headers: {}", path.display()))
    }
}

impl<R: Read> ReadingList<R> {
    pub fn from_reader(reader: R) -> anyhow::Result<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let columns = Columns::from_headers(reader.headers().context("read csv headers")?);
        if columns.title.is_none() {
            tracing::warn!("reading list has no Title column");
        }

        Ok(Self {
            records: reader.into_records(),
            columns,
            failed: false,
        })
    }
}

impl<R: Read> Iterator for ReadingList<R> {
    type Item = anyhow::Result<BookRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            match self.records.next()? {
                Ok(record) => return Some(Ok(self.columns.row(&record))),
                Err(err) => match err.kind() {
                    csv::ErrorKind::Utf8 { .. } | csv::ErrorKind::UnequalLengths { .. } => {
                        tracing::warn!(%err, "skipping malformed csv row");
                    }
                    _ => {
                        self.failed = true;
                        return Some(Err(anyhow::Error::new(err).context("read csv row")));
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out `data` once, then fails every read.
    struct FailingReader {
        data: std::io::Cursor<Vec<u8>>,
        reads_after_data: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.data.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            self.reads_after_data += 1;
            Err(std::io::Error::other("device went away"))
        }
    }

    #[test]
    fn reads_rows_in_order_with_missing_columns_empty() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let path = temp.path().join("books.csv");
        std::fs::write(
            &path,
            "Book Id,Title,ISBN,Exclusive Shelf,Date Read\n\
             234225,Dune,\"=\"\"\"\"\",read,2020/01/01\n\
             5107,\"The Catcher in the Rye\",\"=\"\"0316769177\"\"\",to-read,\n",
        )?;

        let rows = ReadingList::open(&path)?.collect::<anyhow::Result<Vec<_>>>()?;
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].title, "Dune");
        assert_eq!(rows[0].book_id, "234225");
        assert_eq!(rows[0].isbn, "=\"\"");
        assert_eq!(rows[0].author, "");
        assert!(rows[0].is_finished());

        assert_eq!(rows[1].title, "The Catcher in the Rye");
        assert_eq!(rows[1].isbn, "=\"0316769177\"");
        assert!(!rows[1].is_finished());
        Ok(())
    }

    #[test]
    fn short_rows_are_padded_with_empty_fields() -> anyhow::Result<()> {
        let input = "Title,Book Id,Exclusive Shelf,Date Read\nDune\n";

        let rows = ReadingList::from_reader(input.as_bytes())?
            .collect::<anyhow::Result<Vec<_>>>()?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Dune");
        assert_eq!(rows[0].book_id, "");
        assert!(!rows[0].is_finished());
        Ok(())
    }

    #[test]
    fn rows_with_invalid_utf8_are_skipped() -> anyhow::Result<()> {
        let mut input = b"Title,Book Id\nDune,1\n".to_vec();
        input.extend_from_slice(b"Bad \xff Title,2\n");
        input.extend_from_slice(b"Emma,3\n");

        let rows = ReadingList::from_reader(input.as_slice())?
            .collect::<anyhow::Result<Vec<_>>>()?;
        let titles = rows.iter().map(|r| r.title.as_str()).collect::<Vec<_>>();
        assert_eq!(titles, vec!["Dune", "Emma"]);
        Ok(())
    }

    #[test]
    fn read_failure_is_reported_once_and_ends_iteration() -> anyhow::Result<()> {
        let reader = FailingReader {
            data: std::io::Cursor::new(b"Title,Book Id\nDune,1\n".to_vec()),
            reads_after_data: 0,
        };

        let mut list = ReadingList::from_reader(reader)?;
        let first = list.next().expect("first row")?;
        assert_eq!(first.title, "Dune");

        let err = list.next().expect("read error").expect_err("must fail");
        assert!(format!("{err:#}").contains("device went away"), "{err:#}");

        assert!(list.next().is_none());
        assert!(list.next().is_none());
        assert_eq!(list.records.reader().get_ref().reads_after_data, 1);
        Ok(())
    }

    #[test]
    fn finished_requires_read_shelf_and_date() {
        let mut row = BookRow {
            title: "Dune".to_owned(),
            exclusive_shelf: "read".to_owned(),
            date_read: "2020/01/01".to_owned(),
            ..BookRow::default()
        };
        assert!(row.is_finished());

        row.date_read = String::new();
        assert!(!row.is_finished());

        row.date_read = "2020/01/01".to_owned();
        row.exclusive_shelf = "currently-reading".to_owned();
        assert!(!row.is_finished());
    }

    #[test]
    fn open_missing_file_is_an_error() {
        let temp = tempfile::TempDir::new().expect("tempdir");
        assert!(ReadingList::open(&temp.path().join("missing.csv")).is_err());
    }
}
