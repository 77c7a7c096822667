// Example: the page cache on its own, including eviction and shifting inserts.
use datalist::PageVirtualizingList;

fn main() -> datalist::Result<()> {
    let mut pages = PageVirtualizingList::with_page_size(4)?;
    pages.update_count(16, 4)?;
    pages.set_page_cache_size(2)?;

    for i in [0usize, 5, 9] {
        pages.set(i, i * 100)?;
    }
    println!("resident pages={}", pages.resident_page_count());
    println!("slot 0 after eviction={:?}", pages.peek(0)?);

    pages.insert(8, 42)?;
    println!("count={} snapshot={:?}", pages.count(), pages.snapshot());
    Ok(())
}
