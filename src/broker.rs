//! MQTT session task.
//!
//! Maintains the broker connection, subscribes to the panel topics,
//! and routes inbound publishes: music metadata goes to the artwork
//! intake, power/brightness commands to the panel state. Status and
//! brightness changes are reported outward. Reconnects with a fixed
//! backoff whenever the session drops.

use artpanel::artwork::Intake;
use artpanel::config;
use artpanel::error::Error;
use artpanel::mqtt::{route, Inbound, PowerCommand};
use core::fmt::Write;
use defmt::{info, warn};
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpEndpoint, Stack};
use embassy_time::{with_timeout, Duration, Timer};
use rust_mqtt::client::client::MqttClient;
use rust_mqtt::client::client_config::ClientConfig;
use rust_mqtt::packet::v5::publish_packet::QualityOfService;
use rust_mqtt::utils::rng_generator::CountingRng;

/// Reconnect backoff after a failed or dropped session.
const RECONNECT_DELAY_MS: u64 = 5000;

/// Idle receive window before we ping the broker.
const PING_INTERVAL_SECS: u64 = 15;

const MQTT_BUF: usize = 2048;

#[embassy_executor::task]
pub async fn broker_task(stack: Stack<'static>, intake: Intake<'static>) -> ! {
    let mut rx_buffer = [0u8; MQTT_BUF];
    let mut tx_buffer = [0u8; MQTT_BUF];
    let mut recv_buffer = [0u8; MQTT_BUF];
    let mut write_buffer = [0u8; MQTT_BUF];

    loop {
        stack.wait_config_up().await;

        let result = session(
            stack,
            &intake,
            &mut rx_buffer,
            &mut tx_buffer,
            &mut recv_buffer,
            &mut write_buffer,
        )
        .await;

        if result.is_err() {
            warn!("mqtt session ended, reconnecting in {} ms", RECONNECT_DELAY_MS);
        }
        Timer::after(Duration::from_millis(RECONNECT_DELAY_MS)).await;
    }
}

/// One broker session: connect, subscribe, pump messages until the
/// connection drops.
async fn session(
    stack: Stack<'static>,
    intake: &Intake<'static>,
    rx_buffer: &mut [u8],
    tx_buffer: &mut [u8],
    recv_buffer: &mut [u8],
    write_buffer: &mut [u8],
) -> Result<(), ()> {
    let address = stack
        .dns_query(config::BROKER_HOST, DnsQueryType::A)
        .await
        .map_err(|_| ())?
        .first()
        .copied()
        .ok_or(())?;

    let mut socket = TcpSocket::new(stack, rx_buffer, tx_buffer);
    socket.set_timeout(Some(Duration::from_secs(60)));
    socket
        .connect(IpEndpoint::new(address, config::BROKER_PORT))
        .await
        .map_err(|_| ())?;

    let mut mqtt_config: ClientConfig<'_, 5, CountingRng> = ClientConfig::new(
        rust_mqtt::client::client_config::MqttVersion::MQTTv5,
        CountingRng(20000),
    );
    mqtt_config.add_client_id(config::BROKER_CLIENT_ID);
    mqtt_config.add_max_subscribe_qos(QualityOfService::QoS1);
    mqtt_config.max_packet_size = MQTT_BUF as u32;

    let mut client = MqttClient::<_, 5, _>::new(
        socket,
        write_buffer,
        MQTT_BUF,
        recv_buffer,
        MQTT_BUF,
        mqtt_config,
    );

    client.connect_to_broker().await.map_err(|_| ())?;
    info!("mqtt connected to {}:{}", config::BROKER_HOST, config::BROKER_PORT);

    for topic in [
        config::TOPIC_MUSIC_INFO,
        config::TOPIC_COMMAND,
        config::TOPIC_BRIGHTNESS,
    ] {
        client.subscribe_to_topic(topic).await.map_err(|_| ())?;
    }

    client
        .send_message(config::TOPIC_STATUS, b"online", QualityOfService::QoS0, true)
        .await
        .map_err(|_| ())?;

    loop {
        // Echo any pending brightness change before the next wait.
        if let Some(level) = crate::BRIGHTNESS_REPORT.try_take() {
            let mut text: heapless::String<4> = heapless::String::new();
            let _ = write!(&mut text, "{level}");
            client
                .send_message(
                    config::TOPIC_BRIGHTNESS,
                    text.as_bytes(),
                    QualityOfService::QoS0,
                    false,
                )
                .await
                .map_err(|_| ())?;
        }

        match with_timeout(
            Duration::from_secs(PING_INTERVAL_SECS),
            client.receive_message(),
        )
        .await
        {
            Ok(Ok((topic, payload))) => handle_publish(intake, topic, payload).await,
            Ok(Err(_)) => return Err(()),
            // Idle: keep the session alive.
            Err(_) => client.send_ping().await.map_err(|_| ())?,
        }
    }
}

async fn handle_publish(intake: &Intake<'static>, topic: &str, payload: &[u8]) {
    match route(topic, payload) {
        Some(Inbound::Music(music)) => {
            match intake.submit(music.url, music.track, music.artist).await {
                Ok(()) => info!("queued artwork for {}", music.track),
                // Bounded wait expired: drop this notification, a newer
                // one will follow.
                Err(Error::QueueFull) => warn!("artwork queue full, skipping {}", music.track),
                Err(_) => {}
            }
        }
        Some(Inbound::Power(cmd)) => {
            let mut panel = crate::PANEL.lock().await;
            match cmd {
                PowerCommand::On => panel.set_power(true),
                PowerCommand::Off => panel.set_power(false),
                PowerCommand::Toggle => panel.toggle_power(),
            }
            info!("leds {}", if panel.leds_on() { "on" } else { "off" });
        }
        Some(Inbound::Brightness(level)) => {
            let mut panel = crate::PANEL.lock().await;
            panel.set_value(i32::from(level) * 100 / 255);
        }
        None => warn!("unhandled publish on {}", topic),
    }
}
