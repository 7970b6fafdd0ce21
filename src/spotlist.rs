//! The "spot list": a log of pages that failed on both sides of a merge,
//! written as C-style initializer lines so the list can be pasted straight
//! into the capture tooling to re-dump exactly those pages.

use std::io::Write;

use crate::dump::PageId;
use crate::error::Result;

/// Incremental writer for the spot list. Entries are appended as the merge
/// proceeds and share one zero-based index no matter which policy rule
/// produced them.
#[derive(Debug)]
pub struct SpotList<W: Write> {
    out: W,
    next_index: u64,
}

impl<W: Write> SpotList<W> {
    pub fn new(out: W) -> Self {
        Self { out, next_index: 0 }
    }

    /// Append one page, advancing the shared index.
    pub fn push(&mut self, id: PageId) -> Result<()> {
        writeln!(self.out, "spot_list[{}].ce={};", self.next_index, id.ce)?;
        writeln!(self.out, "spot_list[{}].page=0x{:04x};", self.next_index, id.page)?;
        self.next_index += 1;
        Ok(())
    }

    /// How many pages have been logged so far.
    pub fn len(&self) -> u64 {
        self.next_index
    }

    pub fn is_empty(&self) -> bool {
        self.next_index == 0
    }

    /// Hand back the underlying stream.
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[test]
fn test_spot_list_text() -> Result<()> {
    let mut list = SpotList::new(Vec::new());
    assert!(list.is_empty());

    list.push(PageId { ce: 1, page: 0x0002 })?;
    list.push(PageId { ce: 0, page: 0x1234 })?;
    assert_eq!(list.len(), 2);

    let text = String::from_utf8(list.into_inner()).unwrap();
    assert_eq!(
        text,
        "spot_list[0].ce=1;\n\
         spot_list[0].page=0x0002;\n\
         spot_list[1].ce=0;\n\
         spot_list[1].page=0x1234;\n"
    );

    Ok(())
}
