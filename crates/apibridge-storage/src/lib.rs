pub mod entities;
mod store;

pub use store::{
    AppInput, BridgeStorage, CallLogInput, CredentialInput, EndpointInput, StorageError,
    StorageResult,
};
