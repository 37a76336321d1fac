use photodyn::{
    ModelParameters, PhotometricBody, SimulationParams, SteppingPolicy, SystemConfig,
};

const MODEL: &str = r#"{
    "system": {
        "masses": [1.0, 0.3, 0.001],
        "elements": [
            {
                "semi_major_axis": 0.2,
                "eccentricity": 0.1,
                "inclination": 1.55,
                "periapsis_argument": 0.0,
                "ascending_node_longitude": 0.0,
                "mean_anomaly": 0.4
            },
            {
                "semi_major_axis": 1.1,
                "eccentricity": 0.05,
                "inclination": 1.5707963267948966,
                "periapsis_argument": 0.0,
                "ascending_node_longitude": 0.0,
                "mean_anomaly": 2.0
            }
        ],
        "epoch": 0.0
    },
    "photometry": [
        { "radius": 0.05, "flux": 0.8, "limb_darkening": { "u1": 0.4, "u2": 0.2 } },
        { "radius": 0.03, "flux": 0.2, "limb_darkening": { "u1": 0.5, "u2": 0.1 } },
        { "radius": 0.008, "flux": 0.0 }
    ]
}"#;

#[test]
fn test_model_from_json() {
    let model: ModelParameters = serde_json::from_str(MODEL).unwrap();
    assert_eq!(model.system.gravitational_constant, 1.0);
    assert!(model.system.validate().is_ok());
    assert_eq!(model.photometry[2], PhotometricBody::new(0.008, 0.0, Default::default()));

    let curve = model
        .evaluate(&[0.0, 0.5, 1.0], &SimulationParams::default())
        .unwrap();
    assert_eq!(curve.len(), 3);

    let round_trip: ModelParameters =
        serde_json::from_str(&serde_json::to_string(&model).unwrap()).unwrap();
    assert_eq!(round_trip, model);
}

#[test]
fn test_invalid_system_from_json_is_rejected_at_validation() {
    let json = r#"{
        "masses": [1.0, -0.5],
        "elements": [{
            "semi_major_axis": 1.0, "eccentricity": 0.0, "inclination": 0.0,
            "periapsis_argument": 0.0, "ascending_node_longitude": 0.0, "mean_anomaly": 0.0
        }],
        "epoch": 0.0,
        "gravitational_constant": 2.959e-4
    }"#;
    let config: SystemConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.gravitational_constant, 2.959e-4);
    assert!(config.validate().is_err());
}

#[test]
fn test_params_from_json() {
    let mut value = serde_json::to_value(SimulationParams::default()).unwrap();
    value["max_step"] = serde_json::json!(0.05);
    value["stepping"] = serde_json::json!("ResetToEpoch");

    let params: SimulationParams = serde_json::from_value(value).unwrap();
    assert_eq!(params.max_step, 0.05);
    assert_eq!(params.stepping, SteppingPolicy::ResetToEpoch);
    assert!(params.validate().is_ok());
}
