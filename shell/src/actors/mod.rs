pub mod apps;
pub mod chrome;
pub mod embed;
pub mod router;
pub mod store;

pub use apps::AppRegistryActor;
pub use chrome::ChromeBusActor;
pub use embed::EmbedActor;
pub use router::RouterActor;
pub use store::StoreActor;
