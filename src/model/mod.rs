mod squeezenet;
pub use squeezenet::squeezenet_v10;
