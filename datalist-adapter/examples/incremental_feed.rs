// Example: an incremental "load more" list drained from a UI-style loop.
use std::sync::Arc;

use datalist::{FnPageFetcher, PagedDataListSource};
use datalist_adapter::{IncrementalLoadingList, TaskQueue, VectorOptions, VirtualizingVector};
use futures::executor::block_on;

fn main() {
    let items: Vec<String> = (0..42).map(|i| format!("post #{i}")).collect();
    let source = Arc::new(PagedDataListSource::new(
        FnPageFetcher::from_items(items).with_page_size(10),
    ));
    let queue = TaskQueue::new();

    let feed = IncrementalLoadingList::with_options(
        Arc::clone(&source),
        queue.spawner(),
        VectorOptions::new()
            .with_minimum_paging_size(10)
            .with_on_event(|event| println!("feed event: {event:?}")),
    );

    while feed.has_more_items() {
        match block_on(feed.load_more_items(5)) {
            Ok(result) => println!("loaded {} (visible={})", result.count, feed.count()),
            Err(err) => {
                println!("load failed: {err}");
                break;
            }
        }
    }
    println!("feed[41] = {:?}", feed.get(41));

    let vector = VirtualizingVector::with_options(
        Arc::clone(&source),
        queue.spawner(),
        VectorOptions::new().with_on_event(|event| println!("vector event: {event:?}")),
    );
    println!("vector count={}", vector.count());
    println!("vector[3] = {:?}", vector.get(3));

    source.refresh();
    let drained = queue.run_until_stalled();
    println!("drained {drained} background tasks, count={}", vector.count());
}
