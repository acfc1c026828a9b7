mod router;

pub use router::CallRouter;
