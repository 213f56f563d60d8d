pub mod layer_service;
