pub mod relu;
pub mod sigmoid;

pub use relu::relu_op;
pub use sigmoid::sigmoid_op;
