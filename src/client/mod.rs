pub mod backend;
pub mod rpc;

pub use backend::StorageBackend;
pub use rpc::EthRpcClient;
