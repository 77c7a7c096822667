// Example: a paged source behind a skip/take window, with a small page cache.
use std::num::NonZeroUsize;
use std::sync::Arc;

use datalist::{
    DataListSource, DataListSourceExt, DataListUpdate, FnPageFetcher, PagedDataListSource,
    PagedSourceOptions,
};
use futures::executor::block_on;

fn main() {
    let fetcher = FnPageFetcher::new(
        |page_number, page_size| {
            println!("fetching page {page_number}");
            let start = (page_number - 1) * page_size;
            Ok((start..(start + page_size).min(95)).map(|i| format!("row {i}")).collect())
        },
        || Ok(95),
    )
    .with_page_size(10);

    let source = Arc::new(PagedDataListSource::with_options(
        fetcher,
        PagedSourceOptions::new().with_page_cache_size(NonZeroUsize::new(2)),
    ));
    let window = Arc::clone(&source).skip(15).take(20);

    let _sub = window.subscribe(Arc::new(|update: DataListUpdate| {
        println!("window update: {update:?}");
    }));

    block_on(async {
        println!("window count={}", window.count().await.unwrap_or(0));
        for i in [0, 1, 10, 19] {
            match window.item(i).await {
                Ok(item) => println!("window[{i}] = {item}"),
                Err(err) => println!("window[{i}] failed: {err}"),
            }
        }
    });

    println!("page 1 still cached: {}", source.is_cached(0));
    source.refresh();
    println!("cached count after refresh: {:?}", source.cached_count());
}
