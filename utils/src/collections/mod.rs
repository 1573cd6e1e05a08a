pub mod bitmap;
pub mod fast_lazy_static;
pub mod id;
pub mod linkedlist;
pub mod stacklist;
