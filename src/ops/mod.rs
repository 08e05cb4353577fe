pub mod avgpool;
pub mod concat;
pub mod conv2d;
pub mod fire;
pub mod maxpool;
pub mod relu;
