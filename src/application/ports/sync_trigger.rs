/// Fire-and-forget request for a background drain of the current user's queue.
pub trait SyncTrigger: Send + Sync {
    fn request_sync(&self);
}
