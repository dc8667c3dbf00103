pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}
